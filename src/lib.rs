//! A read-only reader for git object storage: loose objects, version 2 pack indices and
//! packfiles, including offset and ref delta resolution.
#[macro_use]
extern crate error_chain;

pub mod errors;
pub mod id;
pub mod paths;
pub mod varint;
pub mod delta;
pub mod objects;
pub mod pack;
pub mod stores;
pub mod refs;

#[cfg(test)]
mod fixtures;

pub use crate::errors::{ Error, ErrorKind, Result };
pub use crate::objects::{ RawObject, Type };
pub use crate::pack::index::Index;
pub use crate::pack::{ Options, Reader };
pub use crate::stores::ObjectStore;
pub use crate::id::Id;
