use crc::{ Crc, CRC_32_ISO_HDLC };
use rayon::prelude::*;
use std::fs::File;
use memmap::Mmap;

use crate::errors::{ ErrorKind, Result };
use crate::pack::index::Index;
use crate::id::{ Id, ID_LEN };

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

// 'PACK', version, object count
const PACK_HEADER_LEN: u64 = 12;

/// Check the raw bytes of every entry (header through the end of its compressed data)
/// against the CRC32 recorded in the index. Returns the ids whose bytes do not match, in
/// ascending id order; an empty vec means the pack is intact.
pub fn verify_crcs(index: &Index) -> Result<Vec<Id>> {
    let file = File::open(index.pack_path())?;
    let mmap = unsafe { Mmap::map(&file)? };
    if (mmap.len() as u64) < PACK_HEADER_LEN + ID_LEN as u64 {
        return Err(ErrorKind::MalformedPackHeader.into())
    }
    let objects_end = (mmap.len() - ID_LEN) as u64;

    let mut entries: Vec<_> = index.iter().collect();
    entries.sort_unstable_by_key(|(_, offset, _)| *offset);

    // each entry runs up to the next one, the last up to the trailing checksum
    let mut spans = Vec::with_capacity(entries.len());
    for (idx, (id, start, crc)) in entries.iter().enumerate() {
        let end = entries.get(idx + 1).map(|(_, next, _)| *next).unwrap_or(objects_end);
        if *start < PACK_HEADER_LEN || *start >= end || end > objects_end {
            return Err(ErrorKind::CorruptedPackfile(
                format!("entry {} spans {}..{} outside the object area", id, start, end)
            ).into())
        }
        spans.push((**id, *start as usize, end as usize, *crc));
    }

    let mut mismatched: Vec<Id> = spans.par_iter()
        .filter_map(|(id, start, end, crc)| {
            if CRC32.checksum(&mmap[*start..*end]) == *crc {
                None
            } else {
                Some(*id)
            }
        })
        .collect();
    mismatched.sort();

    if !mismatched.is_empty() {
        tracing::warn!(
            pack = %index.pack_path().display(),
            mismatched = mismatched.len(),
            "pack entries failed crc32 verification"
        );
    }

    Ok(mismatched)
}
