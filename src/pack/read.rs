use crate::pack::internal_type::{ BaseRef, EntryHeader, EntryKind };
use crate::varint::{ ByteCursor, read_entry_header, read_negative_offset };
use crate::errors::{ ErrorKind, Result };
use crate::id::{ Id, ID_LEN };

/// Decode the header of the entry starting at `offset` from the first bytes of that entry.
/// For deltas this includes the base reference, so `data_start` always points at the zlib
/// stream.
pub fn decode_entry_header(buf: &[u8], offset: u64) -> Result<EntryHeader> {
    let mut cursor = ByteCursor::new(buf);
    let (tag, size, _) = read_entry_header(&mut cursor)?;
    let kind = EntryKind::from_tag(tag)?;

    let base = match kind {
        EntryKind::OffsetDelta => {
            let distance = read_negative_offset(&mut cursor)?;
            // bases always sit strictly before their deltas
            if distance == 0 || distance > offset {
                return Err(ErrorKind::CorruptedPackfile(
                    format!("entry at {} points {} bytes back", offset, distance)
                ).into())
            }
            Some(BaseRef::Offset(offset - distance))
        },

        EntryKind::RefDelta => {
            Some(BaseRef::Id(Id::from_slice(cursor.read_slice(ID_LEN)?)?))
        },

        _ => None
    };

    Ok(EntryHeader {
        kind,
        size,
        base,
        data_start: cursor.position()
    })
}
