use std::io::{ Cursor, Read };
use std::fmt;

use crate::errors::{ ErrorKind, Result };

/// The four kinds of object a caller can get back. Delta entries only exist inside a
/// packfile and are resolved before anything leaves the pack reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Commit,
    Tree,
    Blob,
    Tag
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Commit => "commit",
            Type::Tree => "tree",
            Type::Blob => "blob",
            Type::Tag => "tag"
        }
    }

    /// Map the type word of a loose object header onto a type.
    pub fn from_word(word: &[u8]) -> Result<Type> {
        match word {
            b"commit" => Ok(Type::Commit),
            b"tree" => Ok(Type::Tree),
            b"blob" => Ok(Type::Blob),
            b"tag" => Ok(Type::Tag),
            _ => Err(ErrorKind::UnknownObjectType(String::from_utf8_lossy(word).into_owned()).into())
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Body = Box<dyn Read + Send>;

// declared sizes come from disk; don't trust them for more than this up front
const PREALLOC_LIMIT: u64 = 1 << 20;

/// The result of reading an object: its type, the length it declares, and (unless only the
/// size was asked for) a reader over exactly that many bytes.
///
/// The body owns whatever file handle and inflate state back it, so dropping the object is
/// enough to release them.
pub struct RawObject {
    kind: Type,
    size: u64,
    body: Option<Body>
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl RawObject {
    pub fn header_only(kind: Type, size: u64) -> Self {
        RawObject { kind, size, body: None }
    }

    pub fn streaming(kind: Type, size: u64, body: Body) -> Self {
        RawObject { kind, size, body: Some(body) }
    }

    pub fn buffered(kind: Type, data: Vec<u8>) -> Self {
        RawObject {
            kind,
            size: data.len() as u64,
            body: Some(Box::new(Cursor::new(data)))
        }
    }

    pub fn kind(&self) -> Type {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn into_reader(self) -> Option<Body> {
        self.body
    }

    /// Drain the body into memory. A header-only object yields an empty vec.
    pub fn into_vec(self) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(std::cmp::min(self.size, PREALLOC_LIMIT) as usize);
        if let Some(mut body) = self.body {
            body.read_to_end(&mut output)?;
        }
        Ok(output)
    }
}
