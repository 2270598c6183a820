use flate2::bufread::ZlibDecoder;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{ Path, PathBuf };
use std::fs::File;

use crate::errors::{ ErrorKind, Result };
use crate::paths::loose_object_path;
use crate::objects::{ RawObject, Type };
use crate::id::Id;

// "commit" SP, twenty digits and NUL fit with room to spare
const MAX_HEADER: u64 = 64;

// layout (after inflating) is: type SP decimal-length NUL payload
fn read_header<R: BufRead>(reader: &mut R) -> Result<(Type, u64)> {
    let mut type_vec = Vec::new();
    let mut size_vec = Vec::new();
    let mut header = reader.by_ref().take(MAX_HEADER);

    header.read_until(b' ', &mut type_vec)?;
    if type_vec.pop() != Some(b' ') {
        return Err(ErrorKind::MalformedLength("header ends before the length".into()).into())
    }

    header.read_until(0, &mut size_vec)?;
    if size_vec.pop() != Some(0) {
        return Err(ErrorKind::MalformedLength("header is not NUL terminated".into()).into())
    }

    let size_str = std::str::from_utf8(&size_vec)?;
    let size: i64 = match size_str.parse() {
        Ok(xs) => xs,
        Err(_) => return Err(ErrorKind::MalformedLength(format!("{:?} is not a number", size_str)).into())
    };
    if size < 0 {
        return Err(ErrorKind::MalformedLength(format!("negative length {}", size)).into())
    }

    Ok((Type::from_word(&type_vec)?, size as u64))
}

/// Read the loose object file at `path`. The body, when asked for, is bounded by the declared
/// length and owns the open file.
pub fn read(path: &Path, size_only: bool) -> Result<RawObject> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(
        ZlibDecoder::new(BufReader::new(file))
    );

    let (kind, size) = read_header(&mut reader)?;
    if size_only {
        return Ok(RawObject::header_only(kind, size))
    }

    Ok(RawObject::streaming(kind, size, Box::new(reader.take(size))))
}

/// Loose objects under an `objects/` directory.
#[derive(Debug)]
pub struct Store {
    root: PathBuf
}

impl Store {
    pub fn new(objects_dir: &Path) -> Self {
        Store {
            root: objects_dir.to_path_buf()
        }
    }

    /// `Ok(None)` when no loose file exists for `id`; any other failure is an error.
    pub fn get(&self, id: &Id, size_only: bool) -> Result<Option<RawObject>> {
        let path = loose_object_path(&self.root, id);
        match read(&path, size_only) {
            Ok(object) => Ok(Some(object)),
            Err(e) => match e.kind() {
                ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => Ok(None),
                _ => Err(e)
            }
        }
    }

    pub fn contains(&self, id: &Id) -> bool {
        loose_object_path(&self.root, id).is_file()
    }
}
