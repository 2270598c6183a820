use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use std::fs::File;
use std::io::Read;

use crate::errors::{ ErrorKind, Result };
use crate::id::Id;

// symbolic refs pointing at symbolic refs are followed at most this many times
const MAX_SYMREF_DEPTH: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Local,
    Remote,
    Tag
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefPtr {
    Indirect(String),
    Direct(Id)
}

#[derive(Clone, Debug)]
pub struct Ref {
    kind: Kind,
    ptr: RefPtr
}

/// Every ref under a git directory, keyed by full name (`refs/heads/master`, `HEAD`, ...).
/// Loaded once; nothing here writes refs.
#[derive(Debug, Default)]
pub struct RefSet(HashMap<String, Ref>);

impl Ref {
    fn parse(contents: &str, kind: Kind) -> Result<Ref> {
        let contents = contents.trim();
        if let Some(target) = contents.strip_prefix("ref:") {
            return Ok(Ref {
                kind,
                ptr: RefPtr::Indirect(target.trim().to_string())
            })
        }

        match contents.get(0..40) {
            Some(hex) => Ok(Ref {
                kind,
                ptr: RefPtr::Direct(hex.parse()?)
            }),
            None => Err(ErrorKind::BadId.into())
        }
    }

    pub fn load(path: &Path, kind: Kind) -> Result<Ref> {
        let mut f = File::open(path)?;
        let mut buffer = Vec::new();
        f.read_to_end(&mut buffer)?;
        Ref::parse(std::str::from_utf8(&buffer)?, kind)
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn ptr(&self) -> &RefPtr {
        &self.ptr
    }
}

fn kind_for(name: &str) -> Kind {
    if name.starts_with("refs/tags/") {
        Kind::Tag
    } else if name.starts_with("refs/remotes/") {
        Kind::Remote
    } else {
        Kind::Local
    }
}

fn recurse_dir(
    root: &Path,
    dirs: &mut Vec<String>,
    map: &mut HashMap<String, Ref>,
    k: Kind
) -> Result<()> {
    let entries = match std::fs::read_dir(root) {
        Ok(xs) => xs,
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into())
    };

    for entry in entries {
        let entry = entry?;
        let typ = entry.file_type()?;
        let os_filename = entry.file_name();
        let filename = match os_filename.to_str() {
            Some(xs) => xs,
            None => continue
        };

        dirs.push(String::from(filename));
        if typ.is_dir() {
            recurse_dir(&entry.path(), dirs, map, k)?;
        } else {
            match Ref::load(&entry.path(), k) {
                Ok(reference) => { map.insert(dirs.join("/"), reference); },
                Err(e) => tracing::debug!(name = %dirs.join("/"), error = %e, "skipping unreadable ref")
            }
        }
        dirs.pop();
    }

    Ok(())
}

// lines are "<hex> <name>"; "^<hex>" lines peel the tag above them and "#" lines are comments
fn read_packed(path: &Path, map: &mut HashMap<String, Ref>) -> Result<()> {
    let contents = match std::fs::read_to_string(path) {
        Ok(xs) => xs,
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into())
    };

    for line in contents.lines() {
        if line.starts_with('#') || line.starts_with('^') || line.trim().is_empty() {
            continue
        }

        let mut parts = line.splitn(2, ' ');
        let (hex, name) = match (parts.next(), parts.next()) {
            (Some(hex), Some(name)) => (hex, name.trim()),
            _ => continue
        };

        let id: Id = hex.parse()?;
        map.insert(name.to_string(), Ref {
            kind: kind_for(name),
            ptr: RefPtr::Direct(id)
        });
    }

    Ok(())
}

impl RefSet {
    /// Load refs from a git directory (the one holding `HEAD`, `refs/` and `objects/`).
    /// Loose refs win over `packed-refs` entries of the same name.
    pub fn from_path(git_dir: &Path) -> Result<RefSet> {
        let mut map = HashMap::new();
        read_packed(&git_dir.join("packed-refs"), &mut map)?;

        let mut dirs = vec!["refs".to_string()];
        let mut root = PathBuf::from(git_dir);
        root.push("refs");
        for &(subdir, kind) in &[("heads", Kind::Local), ("remotes", Kind::Remote), ("tags", Kind::Tag)] {
            dirs.push(subdir.to_string());
            recurse_dir(&root.join(subdir), &mut dirs, &mut map, kind)?;
            dirs.pop();
        }

        if let Ok(reference) = Ref::load(&git_dir.join("HEAD"), Kind::Local) {
            map.insert(String::from("HEAD"), reference);
        }

        Ok(RefSet(map))
    }

    pub fn get(&self, name: &str) -> Option<&Ref> {
        self.0.get(name)
    }

    fn lookup(&self, name: &str) -> Option<&Ref> {
        // same precedence as `git rev-parse`
        let candidates = [
            name.to_string(),
            format!("refs/{}", name),
            format!("refs/tags/{}", name),
            format!("refs/heads/{}", name),
            format!("refs/remotes/{}", name)
        ];
        candidates.iter().find_map(|candidate| self.0.get(candidate.as_str()))
    }

    /// Follow `name` (short or full) through any symbolic refs to an id.
    pub fn deref(&self, name: &str) -> Option<&Id> {
        let mut reference = self.lookup(name);
        for _ in 0..=MAX_SYMREF_DEPTH {
            match reference?.ptr {
                RefPtr::Direct(ref id) => return Some(id),
                RefPtr::Indirect(ref target) => {
                    reference = self.0.get(target.as_str());
                }
            }
        }
        None
    }

    /// Short names of every tag, sorted.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys()
            .filter_map(|name| name.strip_prefix("refs/tags/"))
            .collect();
        names.sort_unstable();
        names
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.0.contains_key(&format!("refs/tags/{}", name))
    }
}
