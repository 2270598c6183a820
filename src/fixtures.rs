//! Builders for on-disk packfiles, pack indices and loose objects used by the tests.
use crypto::{ sha1::Sha1, digest::Digest };
use crc::{ Crc, CRC_32_ISO_HDLC };
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use std::io::Write;

use crate::objects::Type;
use crate::id::Id;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub enum Entry {
    Plain(Type, Vec<u8>),
    /// `delta` is the inflated delta payload, size prefixes included
    OffsetDelta { base_offset: u64, id: Id, delta: Vec<u8> },
    RefDelta { base: Id, id: Id, delta: Vec<u8> },
    /// bytes written as-is, header and all
    Raw { id: Id, bytes: Vec<u8> }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to vec");
    encoder.finish().expect("finish zlib stream")
}

fn type_bits(kind: Type) -> u8 {
    match kind {
        Type::Commit => 1,
        Type::Tree => 2,
        Type::Blob => 3,
        Type::Tag => 4
    }
}

pub fn entry_header(type_bits: u8, mut size: u64) -> Vec<u8> {
    let mut byte = (type_bits << 4) | (size & 0x0f) as u8;
    size >>= 4;
    let mut out = Vec::new();
    while size != 0 {
        out.push(byte | 0x80);
        byte = (size & 0x7f) as u8;
        size >>= 7;
    }
    out.push(byte);
    out
}

pub fn negative_offset(mut distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance != 0 {
        distance -= 1;
        out.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    out.reverse();
    out
}

fn base128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return
        }
        out.push(byte | 0x80);
    }
}

/// Prefix a delta instruction stream with its base and result sizes.
pub fn delta_payload(base_len: usize, result_len: usize, instructions: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    base128(base_len as u64, &mut out);
    base128(result_len as u64, &mut out);
    out.extend_from_slice(instructions);
    out
}

/// Lays entries out in a version 2 packfile and writes a matching version 2 index.
pub struct PackBuilder {
    pack: Vec<u8>,
    entries: Vec<(Id, u64, u32)>,
    large: HashMap<Id, u64>
}

impl PackBuilder {
    pub fn new() -> Self {
        PackBuilder {
            pack: Vec::new(),
            entries: Vec::new(),
            large: HashMap::new()
        }
    }

    /// Append an entry, returning its id and byte offset in the finished pack.
    pub fn add(&mut self, entry: Entry) -> (Id, u64) {
        // the 12 byte pack header is prepended on write
        let offset = 12 + self.pack.len() as u64;
        let (id, raw) = match entry {
            Entry::Plain(kind, data) => {
                let mut raw = entry_header(type_bits(kind), data.len() as u64);
                raw.extend(zlib(&data));
                (Id::hash_object(kind, &data), raw)
            },
            Entry::OffsetDelta { base_offset, id, delta } => {
                let mut raw = entry_header(6, delta.len() as u64);
                raw.extend(negative_offset(offset - base_offset));
                raw.extend(zlib(&delta));
                (id, raw)
            },
            Entry::RefDelta { base, id, delta } => {
                let mut raw = entry_header(7, delta.len() as u64);
                raw.extend_from_slice(base.as_bytes());
                raw.extend(zlib(&delta));
                (id, raw)
            },
            Entry::Raw { id, bytes } => (id, bytes)
        };

        self.entries.push((id, offset, CRC32.checksum(&raw)));
        self.pack.extend(raw);
        (id, offset)
    }

    /// Record `offset` for `id` through the large offset table instead of its real offset.
    pub fn force_large_offset(&mut self, id: Id, offset: u64) {
        self.large.insert(id, offset);
    }

    /// Write `<name>.pack` and `<name>.idx` into `dir`.
    pub fn write(self, dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        let mut pack = Vec::with_capacity(self.pack.len() + 32);
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        pack.extend_from_slice(&self.pack);
        let pack_checksum = sha1(&pack);
        pack.extend_from_slice(&pack_checksum);

        let mut sorted = self.entries.clone();
        sorted.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));

        let mut fanout = [0u32; 256];
        for (id, _, _) in &sorted {
            fanout[id.first_byte() as usize] += 1;
        }
        for idx in 1..256 {
            fanout[idx] += fanout[idx - 1];
        }

        let mut idx = Vec::new();
        idx.extend_from_slice(b"\xfftOc");
        idx.extend_from_slice(&2u32.to_be_bytes());
        for count in fanout.iter() {
            idx.extend_from_slice(&count.to_be_bytes());
        }
        for (id, _, _) in &sorted {
            idx.extend_from_slice(id.as_bytes());
        }
        for (_, _, crc) in &sorted {
            idx.extend_from_slice(&crc.to_be_bytes());
        }

        let mut large_offsets = Vec::new();
        for (id, offset, _) in &sorted {
            let offset = self.large.get(id).cloned().unwrap_or(*offset);
            if offset > 0x7fff_ffff {
                idx.extend_from_slice(&(0x8000_0000 | large_offsets.len() as u32).to_be_bytes());
                large_offsets.push(offset);
            } else {
                idx.extend_from_slice(&(offset as u32).to_be_bytes());
            }
        }
        for offset in large_offsets {
            idx.extend_from_slice(&offset.to_be_bytes());
        }

        idx.extend_from_slice(&pack_checksum);
        let idx_checksum = sha1(&idx);
        idx.extend_from_slice(&idx_checksum);

        let pack_path = dir.join(format!("{}.pack", name));
        let idx_path = dir.join(format!("{}.idx", name));
        std::fs::write(&pack_path, &pack).expect("write pack");
        std::fs::write(&idx_path, &idx).expect("write index");
        (pack_path, idx_path)
    }
}

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hash = Sha1::new();
    hash.input(data);
    let mut out = [0u8; 20];
    hash.result(&mut out);
    out
}

/// Write a loose object whose inflated contents are exactly `contents` (header included).
pub fn write_loose_raw(objects_dir: &Path, id: &Id, contents: &[u8]) -> PathBuf {
    let path = crate::paths::loose_object_path(objects_dir, id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fanout dir");
    }
    std::fs::write(&path, zlib(contents)).expect("write loose object");
    path
}

/// Write a well-formed loose object and return its id.
pub fn write_loose(objects_dir: &Path, kind: Type, payload: &[u8]) -> Id {
    let id = Id::hash_object(kind, payload);
    let mut contents = format!("{} {}\0", kind.as_str(), payload.len()).into_bytes();
    contents.extend_from_slice(payload);
    write_loose_raw(objects_dir, &id, &contents);
    id
}

#[cfg(test)]
mod tests {
    use super::{ negative_offset, entry_header };
    use crate::varint::{ ByteCursor, read_negative_offset, read_entry_header };

    #[test]
    fn encoders_agree_with_the_decoders() {
        for &distance in &[1u64, 127, 128, 255, 16_511, 16_512, 1 << 40] {
            let bytes = negative_offset(distance);
            let mut cursor = ByteCursor::new(&bytes);
            assert_eq!(read_negative_offset(&mut cursor).unwrap(), distance);
            assert_eq!(cursor.remaining(), 0);
        }

        let bytes = entry_header(3, 1_000_000);
        let mut cursor = ByteCursor::new(&bytes);
        let (tag, size, consumed) = read_entry_header(&mut cursor).unwrap();
        assert_eq!((tag, size, consumed), (0x30, 1_000_000, bytes.len()));
    }
}
