use flate2::bufread::ZlibDecoder;
use std::io::{ BufReader, Read, Seek, SeekFrom };
use std::path::Path;
use std::fs::File;

use crate::pack::internal_type::{ BaseRef, EntryHeader };
use crate::pack::read::decode_entry_header;
use crate::errors::{ ErrorKind, Result };
use crate::varint::read_base128;
use crate::objects::RawObject;
use crate::pack::index::Index;
use crate::id::Id;
use crate::delta;

pub mod index;
pub mod internal_type;
pub mod read;
pub mod verify;

// pack format is:
//
//      4 byte magic number ('P', 'A', 'C', 'K')
//      4 byte version number (2 or 3)
//      4 byte object count (N)
//      N objects
//      20 byte checksum

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 256;

// an entry header is at most 10 size bytes plus a 20 byte base id
const HEADER_PEEK: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// How many deltas may be stacked on top of a base before a read gives up.
    pub max_chain_depth: usize,
    /// Compare the base length recorded in each delta against the base actually read.
    pub verify_base_length: bool
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            verify_base_length: true
        }
    }
}

/// Reads entries out of the packfile paired with `index`.
///
/// Every read opens its own handle on the packfile, so a `Reader` (and the index it borrows)
/// can be shared between threads. Each level of a delta chain holds one more handle until the
/// level above it has been rebuilt.
#[derive(Debug)]
pub struct Reader<'a> {
    index: &'a Index,
    options: Options
}

fn open_at(path: &Path, offset: u64) -> Result<File> {
    let mut file = File::open(path)?;
    let landed = file.seek(SeekFrom::Start(offset))?;
    if landed != offset {
        return Err(ErrorKind::SeekFailed(offset, landed).into())
    }
    Ok(file)
}

fn peek_header(file: &mut File, offset: u64) -> Result<EntryHeader> {
    let mut buf = [0u8; HEADER_PEEK];
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into())
        }
    }

    if filled == 0 {
        return Err(ErrorKind::EmptyRead(offset).into())
    }

    decode_entry_header(&buf[..filled], offset)
}

fn inflate_from(mut file: File, position: u64) -> Result<ZlibDecoder<BufReader<File>>> {
    let landed = file.seek(SeekFrom::Start(position))?;
    if landed != position {
        return Err(ErrorKind::SeekFailed(position, landed).into())
    }
    Ok(ZlibDecoder::new(BufReader::new(file)))
}

impl<'a> Reader<'a> {
    pub fn new(index: &'a Index) -> Self {
        Reader::with_options(index, Options::default())
    }

    pub fn with_options(index: &'a Index, options: Options) -> Self {
        Reader { index, options }
    }

    pub fn index(&self) -> &'a Index {
        self.index
    }

    /// Look `id` up in the index and read it. `Ok(None)` when this pack does not have it.
    pub fn read(&self, id: &Id, size_only: bool) -> Result<Option<RawObject>> {
        match self.index.find(id) {
            Some(offset) => self.read_at(offset, size_only).map(Some),
            None => Ok(None)
        }
    }

    /// Read the entry at `offset`, resolving any delta chain beneath it.
    ///
    /// With `size_only` the result carries no body. Plain entries then cost one header read;
    /// deltas still walk their chain (in size-only mode) to learn the final type, and report
    /// the result length recorded in the delta stream.
    pub fn read_at(&self, offset: u64, size_only: bool) -> Result<RawObject> {
        let mut chain = Vec::new();
        self.read_chain(offset, size_only, &mut chain)
    }

    fn read_chain(&self, offset: u64, size_only: bool, chain: &mut Vec<u64>) -> Result<RawObject> {
        let mut file = open_at(self.index.pack_path(), offset)?;
        let header = peek_header(&mut file, offset)?;
        let data_start = offset + header.data_start as u64;

        let base_offset = match header.base {
            None => {
                let kind = match header.kind.final_type() {
                    Some(xs) => xs,
                    None => return Err(ErrorKind::CorruptedPackfile("delta without a base".into()).into())
                };

                if size_only {
                    return Ok(RawObject::header_only(kind, header.size))
                }

                let stream = inflate_from(file, data_start)?;
                return Ok(RawObject::streaming(kind, header.size, Box::new(stream.take(header.size))))
            },

            Some(BaseRef::Offset(xs)) => xs,

            Some(BaseRef::Id(id)) => match self.index.find(&id) {
                Some(xs) => xs,
                None => return Err(ErrorKind::BaseObjectNotFound(id).into())
            }
        };

        if chain.len() >= self.options.max_chain_depth {
            return Err(ErrorKind::DeltaChainTooDeep(self.options.max_chain_depth).into())
        }
        chain.push(offset);
        if chain.contains(&base_offset) {
            return Err(ErrorKind::DeltaCycle(base_offset).into())
        }

        tracing::trace!(offset, base_offset, depth = chain.len(), "resolving delta base");
        let base = self.read_chain(base_offset, size_only, chain)?;
        chain.pop();

        let mut instructions = inflate_from(file, data_start)?;
        let (base_len, _) = read_base128(&mut instructions)?;
        let (result_len, _) = read_base128(&mut instructions)?;

        if size_only {
            return Ok(RawObject::header_only(base.kind(), result_len))
        }

        let kind = base.kind();
        let base = base.into_vec()?;
        if self.options.verify_base_length && base_len != base.len() as u64 {
            return Err(ErrorKind::DeltaLengthMismatch(base_len, base.len() as u64).into())
        }

        let output = delta::apply(&base, &mut instructions, result_len)?;
        Ok(RawObject::buffered(kind, output))
    }
}
