use std::path::{ Path, PathBuf };

use crate::id::Id;

/// `objects/<first 2 hex>/<remaining 38 hex>`. The file is not checked for existence.
pub fn loose_object_path(objects_dir: &Path, id: &Id) -> PathBuf {
    let as_str = id.to_string();
    let mut pb = objects_dir.to_path_buf();
    pb.push(&as_str[0..2]);
    pb.push(&as_str[2..]);
    pb
}

pub fn index_path_for_pack(pack_path: &Path) -> PathBuf {
    pack_path.with_extension("idx")
}

pub fn pack_path_for_index(index_path: &Path) -> PathBuf {
    index_path.with_extension("pack")
}
