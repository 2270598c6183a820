use crate::errors::{ ErrorKind, Result };
use crate::objects::Type;
use crate::id::Id;

pub const OFS_DELTA: u8 = 0x60;
pub const REF_DELTA: u8 = 0x70;

/// The kind of a packfile entry, decoded from bits 4-6 of its first header byte. Nothing
/// past the header decoder looks at the raw bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    OffsetDelta,
    RefDelta
}

impl EntryKind {
    /// `tag` is the first header byte masked with `0x70`.
    pub fn from_tag(tag: u8) -> Result<EntryKind> {
        match tag {
            0x10 => Ok(EntryKind::Commit),
            0x20 => Ok(EntryKind::Tree),
            0x30 => Ok(EntryKind::Blob),
            0x40 => Ok(EntryKind::Tag),
            OFS_DELTA => Ok(EntryKind::OffsetDelta),
            REF_DELTA => Ok(EntryKind::RefDelta),
            _ => Err(ErrorKind::CorruptedPackfile(format!("unknown entry type {:#04x}", tag)).into())
        }
    }

    /// The object type for non-delta entries.
    pub fn final_type(self) -> Option<Type> {
        match self {
            EntryKind::Commit => Some(Type::Commit),
            EntryKind::Tree => Some(Type::Tree),
            EntryKind::Blob => Some(Type::Blob),
            EntryKind::Tag => Some(Type::Tag),
            EntryKind::OffsetDelta | EntryKind::RefDelta => None
        }
    }
}

/// Where a delta entry's base lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseRef {
    Offset(u64),
    Id(Id)
}

/// The decoded header of one packfile entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    pub size: u64,
    pub base: Option<BaseRef>,
    /// bytes from the start of the entry to the start of its zlib stream
    pub data_start: usize
}
