use once_cell::sync::OnceCell;
use std::path::{ Path, PathBuf };

use crate::pack::{ Options, Reader };
use crate::errors::{ ErrorKind, Result };
use crate::paths::pack_path_for_index;
use crate::objects::{ RawObject, Type };
use crate::pack::index::Index;
use crate::id::Id;

pub mod loose;

/// One `.idx`/`.pack` pair. The index is parsed the first time a lookup needs it and is
/// shared read-only after that.
#[derive(Debug)]
pub struct PackEntry {
    index_path: PathBuf,
    index: OnceCell<Index>
}

impl PackEntry {
    fn new(index_path: PathBuf) -> Self {
        PackEntry {
            index_path,
            index: OnceCell::new()
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn is_loaded(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn index(&self) -> Result<&Index> {
        self.index.get_or_try_init(|| Index::parse(&self.index_path))
    }
}

/// Every object reachable from an `objects/` directory: loose files first, then each pack in
/// `objects/pack`, in file name order.
#[derive(Debug)]
pub struct ObjectStore {
    objects_dir: PathBuf,
    loose: loose::Store,
    packs: Vec<PackEntry>,
    options: Options
}

fn discover_packs(objects_dir: &Path) -> Result<Vec<PackEntry>> {
    let mut root = objects_dir.to_path_buf();
    root.push("pack");

    let entries = match std::fs::read_dir(&root) {
        Ok(xs) => xs,
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into())
    };

    let mut index_paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().map_or(true, |ext| ext != "idx") {
            continue
        }

        if !pack_path_for_index(&path).is_file() {
            tracing::warn!(index = %path.display(), "skipping pack index without a packfile");
            continue
        }
        index_paths.push(path);
    }
    index_paths.sort();

    Ok(index_paths.into_iter().map(PackEntry::new).collect())
}

impl ObjectStore {
    pub fn new(objects_dir: &Path) -> Result<Self> {
        ObjectStore::with_options(objects_dir, Options::default())
    }

    pub fn with_options(objects_dir: &Path, options: Options) -> Result<Self> {
        let packs = discover_packs(objects_dir)?;
        tracing::debug!(objects = %objects_dir.display(), packs = packs.len(), "opened object store");

        Ok(ObjectStore {
            objects_dir: objects_dir.to_path_buf(),
            loose: loose::Store::new(objects_dir),
            packs,
            options
        })
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn packs(&self) -> &[PackEntry] {
        &self.packs
    }

    fn get(&self, id: &Id, size_only: bool) -> Result<Option<RawObject>> {
        if let Some(object) = self.loose.get(id, size_only)? {
            return Ok(Some(object))
        }

        for pack in &self.packs {
            let index = pack.index()?;
            if let Some(object) = Reader::with_options(index, self.options).read(id, size_only)? {
                return Ok(Some(object))
            }
        }

        Ok(None)
    }

    /// Read an object with a body to stream from.
    pub fn read(&self, id: &Id) -> Result<Option<RawObject>> {
        self.get(id, false)
    }

    /// Read only the type and length of an object.
    pub fn read_header(&self, id: &Id) -> Result<Option<RawObject>> {
        self.get(id, true)
    }

    pub fn contains(&self, id: &Id) -> Result<bool> {
        if self.loose.contains(id) {
            return Ok(true)
        }

        for pack in &self.packs {
            if pack.index()?.contains(id) {
                return Ok(true)
            }
        }

        Ok(false)
    }

    /// Read an object fully and check that its contents hash back to `id`.
    pub fn read_verified(&self, id: &Id) -> Result<Option<(Type, Vec<u8>)>> {
        let object = match self.read(id)? {
            Some(xs) => xs,
            None => return Ok(None)
        };

        let kind = object.kind();
        let size = object.size();
        let data = object.into_vec()?;
        if data.len() as u64 != size {
            return Err(ErrorKind::MalformedLength(
                format!("{} declares {} bytes but holds {}", id, size, data.len())
            ).into())
        }

        let actual = Id::hash_object(kind, &data);
        if actual != *id {
            return Err(ErrorKind::ChecksumMismatch(format!("{} hashes to {}", id, actual)).into())
        }

        Ok(Some((kind, data)))
    }
}
