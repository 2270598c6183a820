use crypto::{ sha1::Sha1, digest::Digest };
use std::str::FromStr;
use std::fmt;

use crate::errors::{ Error, ErrorKind, Result };
use crate::objects::Type;

pub const ID_LEN: usize = 20;

/// A 20 byte (binary, not hex) content identifier. Ordering is byte-wise, which matches
/// the order ids appear in a pack index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id([u8; ID_LEN]);

impl fmt::Debug for Id {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", hex::encode(self.0))
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.len() != ID_LEN * 2 {
            return Err(ErrorKind::BadId.into())
        }

        let mut id = [0u8; ID_LEN];
        hex::decode_to_slice(input, &mut id)?;
        Ok(Id(id))
    }
}

impl From<[u8; ID_LEN]> for Id {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Id(bytes)
    }
}

impl From<&[u8; ID_LEN]> for Id {
    fn from(bytes: &[u8; ID_LEN]) -> Self {
        Id(*bytes)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Id {
    /// Copy an id out of a byte slice. Fails unless the slice is exactly 20 bytes long.
    pub fn from_slice(input: &[u8]) -> Result<Id> {
        if input.len() != ID_LEN {
            return Err(ErrorKind::BadId.into())
        }

        let mut dst = [0u8; ID_LEN];
        dst.copy_from_slice(input);
        Ok(Id(dst))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// The id git would assign to an object: sha1 over `"<type> <len>\0"` plus the payload.
    pub fn hash_object(kind: Type, payload: &[u8]) -> Id {
        let mut hash = Sha1::new();
        let header = format!("{} {}\0", kind.as_str(), payload.len());
        hash.input(header.as_bytes());
        hash.input(payload);

        let mut output = [0u8; ID_LEN];
        hash.result(&mut output);
        Id(output)
    }
}
