use byteorder::{ BigEndian, ReadBytesExt };
use crypto::{ sha1::Sha1, digest::Digest };
use std::io::{ Cursor, Read };
use std::path::{ Path, PathBuf };
use std::fs::File;
use memmap::Mmap;

use crate::errors::{ ErrorKind, Result };
use crate::paths::pack_path_for_index;
use crate::id::{ Id, ID_LEN };

// index format is:
//
//      4 byte magic number (\377tOc)
//      4 byte version number (= 2)
//      256 * 4 fanout table (read last entry to determine N)
//      N * 20 sorted ids
//      N * 4 crc32 values
//      N * 4 offset values (31 bit, if 32nd/MSB set number is an offset into large offset table)
//      some number of 8 byte offsets
//      20 byte packfile shasum
//      20 byte shasum of preceding contents
//
// the fanout maps the first byte of an incoming id to an upper bound index into the entries
//
//      00a0ddd <- fanout[0] ---+ (lo)
//      00acfff                 |
//      00ad000                 +--------------- this lets us do a bounded binary search for 00acfff
//      00ad001                 |                which gives us the offset in the packfile
//      01bbbbb <- fanout[1] ---+ (hi)

pub const INDEX_MAGIC: &[u8; 4] = b"\xfftOc";
pub const INDEX_VERSION: u32 = 2;
pub const PACK_MAGIC: &[u8; 4] = b"PACK";

const HEADER_LEN: usize = 8;
const FANOUT_LEN: usize = 256 * 4;
const TRAILER_LEN: usize = ID_LEN * 2;
// id + crc32 + 4 byte offset
const ENTRY_LEN: usize = ID_LEN + 4 + 4;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// A parsed version 2 pack index, paired with the packfile it describes. Immutable once
/// built; lookups only need a shared reference.
#[derive(Debug)]
pub struct Index {
    index_path: PathBuf,
    pack_path: PathBuf,
    pack_version: u32,
    fanout: [u32; 256],
    ids: Vec<Id>,
    crcs: Vec<u32>,
    offsets: Vec<u64>,
    pack_checksum: [u8; ID_LEN],
    checksum: [u8; ID_LEN]
}

fn malformed<T>(reason: &str) -> Result<T> {
    Err(ErrorKind::MalformedIndex(reason.to_string()).into())
}

/// Read the 8 byte packfile header, returning the declared pack version.
pub fn read_pack_header(pack_path: &Path) -> Result<u32> {
    let mut file = File::open(pack_path)?;
    let mut header = [0u8; 8];
    if let Err(e) = file.read_exact(&mut header) {
        return match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Err(ErrorKind::MalformedPackHeader.into()),
            _ => Err(e.into())
        }
    }

    if &header[0..4] != PACK_MAGIC {
        return Err(ErrorKind::MalformedPackHeader.into())
    }

    Ok((&header[4..]).read_u32::<BigEndian>()?)
}

impl Index {
    /// Parse the index at `index_path` and validate the header of the packfile next to it.
    pub fn parse(index_path: &Path) -> Result<Index> {
        let file = File::open(index_path)?;
        let len = file.metadata()?.len();
        if len < (HEADER_LEN + FANOUT_LEN + TRAILER_LEN) as u64 {
            // too short to map meaningfully; let from_bytes sort out which error applies
            let mut bytes = Vec::with_capacity(len as usize);
            (&file).read_to_end(&mut bytes)?;
            return Index::from_bytes(index_path.to_path_buf(), &bytes)
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let mut index = Index::from_bytes(index_path.to_path_buf(), &mmap[..])?;
        index.pack_version = read_pack_header(&index.pack_path)?;
        Ok(index)
    }

    /// Parse index bytes without touching the packfile; `pack_version` stays 0.
    pub fn from_bytes(index_path: PathBuf, bytes: &[u8]) -> Result<Index> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
            return Err(ErrorKind::UnsupportedIndexVersion.into())
        }

        let mut input = Cursor::new(bytes);
        input.set_position(4);
        if input.read_u32::<BigEndian>()? != INDEX_VERSION {
            return Err(ErrorKind::UnsupportedIndexVersion.into())
        }

        if bytes.len() < HEADER_LEN + FANOUT_LEN + TRAILER_LEN {
            return malformed("too short for fanout table")
        }

        let mut fanout = [0u32; 256];
        input.read_u32_into::<BigEndian>(&mut fanout)?;
        if fanout.windows(2).any(|pair| pair[0] > pair[1]) {
            return malformed("fanout table is not monotonic")
        }

        let object_count = fanout[255] as usize;
        let fixed = object_count.checked_mul(ENTRY_LEN)
            .and_then(|xs| xs.checked_add(HEADER_LEN + FANOUT_LEN + TRAILER_LEN));
        let large_table_len = match fixed.and_then(|xs| bytes.len().checked_sub(xs)) {
            Some(xs) => xs,
            None => return malformed("shorter than its object count requires")
        };
        if large_table_len % 8 != 0 {
            return malformed("large offset table is not a whole number of entries")
        }

        let mut ids = Vec::with_capacity(object_count);
        let mut id_bytes = [0u8; ID_LEN];
        for _ in 0..object_count {
            input.read_exact(&mut id_bytes)?;
            ids.push(Id::from(id_bytes));
        }
        if ids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return malformed("ids are not sorted and unique")
        }

        let mut crcs = vec![0u32; object_count];
        input.read_u32_into::<BigEndian>(&mut crcs)?;

        let mut small_offsets = vec![0u32; object_count];
        input.read_u32_into::<BigEndian>(&mut small_offsets)?;

        // the large table has to be in hand before any flagged offset can be resolved
        let mut large_offsets = vec![0u64; large_table_len / 8];
        input.read_u64_into::<BigEndian>(&mut large_offsets)?;

        let mut offsets = Vec::with_capacity(object_count);
        for offset in small_offsets {
            if offset & LARGE_OFFSET_FLAG == 0 {
                offsets.push(u64::from(offset));
                continue
            }

            match large_offsets.get((offset & !LARGE_OFFSET_FLAG) as usize) {
                Some(xs) => offsets.push(*xs),
                None => return malformed("offset points past the large offset table")
            }
        }

        let mut pack_checksum = [0u8; ID_LEN];
        input.read_exact(&mut pack_checksum)?;
        let mut checksum = [0u8; ID_LEN];
        input.read_exact(&mut checksum)?;

        tracing::debug!(
            index = %index_path.display(),
            objects = object_count,
            large_offsets = large_offsets.len(),
            "parsed pack index"
        );

        Ok(Index {
            pack_path: pack_path_for_index(&index_path),
            index_path,
            pack_version: 0,
            fanout,
            ids,
            crcs,
            offsets,
            pack_checksum,
            checksum
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn pack_path(&self) -> &Path {
        &self.pack_path
    }

    pub fn pack_version(&self) -> u32 {
        self.pack_version
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn pack_checksum(&self) -> &[u8; ID_LEN] {
        &self.pack_checksum
    }

    pub fn checksum(&self) -> &[u8; ID_LEN] {
        &self.checksum
    }

    fn position(&self, id: &Id) -> Option<usize> {
        let first = id.first_byte() as usize;
        let lo = if first > 0 { self.fanout[first - 1] as usize } else { 0 };
        let hi = self.fanout[first] as usize;

        self.ids[lo..hi].binary_search(id).ok().map(|idx| lo + idx)
    }

    /// The byte offset of `id` within the packfile.
    pub fn find(&self, id: &Id) -> Option<u64> {
        self.position(id).map(|idx| self.offsets[idx])
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.position(id).is_some()
    }

    pub fn crc32(&self, id: &Id) -> Option<u32> {
        self.position(id).map(|idx| self.crcs[idx])
    }

    /// `(id, offset, crc32)` in index order, which is ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&Id, u64, u32)> + '_ {
        self.ids.iter()
            .zip(self.offsets.iter())
            .zip(self.crcs.iter())
            .map(|((id, offset), crc)| (id, *offset, *crc))
    }

    /// Check the trailing index checksum against the file contents, and the recorded
    /// packfile checksum against the packfile trailer.
    pub fn verify_checksum(&self) -> Result<()> {
        let file = File::open(&self.index_path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < TRAILER_LEN {
            return malformed("too short for trailer")
        }

        let mut hash = Sha1::new();
        hash.input(&mmap[.. mmap.len() - ID_LEN]);
        let mut computed = [0u8; ID_LEN];
        hash.result(&mut computed);
        if computed != self.checksum {
            return Err(ErrorKind::ChecksumMismatch(format!("index {}", self.index_path.display())).into())
        }

        let pack = File::open(&self.pack_path)?;
        let pack_map = unsafe { Mmap::map(&pack)? };
        if pack_map.len() < ID_LEN || pack_map[pack_map.len() - ID_LEN ..] != self.pack_checksum[..] {
            return Err(ErrorKind::ChecksumMismatch(format!("pack {}", self.pack_path.display())).into())
        }

        Ok(())
    }
}
