use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::warn;

use crate::path::VPath;
use crate::tree::{Trees, VFile, VFolder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// The tar type flag character for this kind.
    #[inline(always)]
    pub fn as_char(self) -> char {
        match self {
            EntryKind::File => '0',
            EntryKind::Directory => '5',
        }
    }

    pub fn from_char(c: char) -> Option<EntryKind> {
        match c {
            '0' => Some(EntryKind::File),
            '5' => Some(EntryKind::Directory),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
        }
    }
}

/// Where one indexed entry lives inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    pub path: VPath,
    /// Offset of the first content byte, just past the entry's header.
    pub offset: u64,
    pub size: u64,
    pub kind: EntryKind,
}

impl EntryState {
    #[inline(always)]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    #[inline(always)]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// The path is already indexed.
    Duplicate(VPath),
    /// The path would be both a file and a folder.
    Conflict(VPath),
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::Duplicate(path) => write!(f, "duplicate path '{}'", path),
            InsertError::Conflict(path) => {
                write!(f, "path '{}' is used as both a file and a folder", path)
            }
        }
    }
}

impl std::error::Error for InsertError {}

/// The archive index: entries in archive order, looked up by path.
#[derive(Debug, Clone, Default)]
pub struct Statemap {
    entries: Vec<EntryState>,
    lookup: HashMap<String, usize>,
    ancestors: HashSet<String>,
}

impl PartialEq for Statemap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Statemap {}

impl Statemap {
    pub fn new() -> Statemap {
        Statemap::default()
    }

    pub fn insert(&mut self, entry: EntryState) -> Result<(), InsertError> {
        let key = entry.path.key();

        if let Some(idx) = self.lookup.get(key) {
            return if self.entries[*idx].kind == entry.kind {
                Err(InsertError::Duplicate(entry.path))
            } else {
                Err(InsertError::Conflict(entry.path))
            };
        }

        if entry.is_file() && self.ancestors.contains(key) {
            return Err(InsertError::Conflict(entry.path));
        }

        let file_ancestor = entry.path.ancestor_keys().any(|k| {
            self.lookup
                .get(k)
                .map(|idx| self.entries[*idx].is_file())
                .unwrap_or(false)
        });
        if file_ancestor {
            return Err(InsertError::Conflict(entry.path));
        }

        for k in entry.path.ancestor_keys() {
            if !self.ancestors.contains(k) {
                self.ancestors.insert(k.to_string());
            }
        }
        self.lookup.insert(key.to_string(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Looks up an entry by path. Trailing separators are ignored, so both
    /// `/a` and `/a/` find the same entry.
    pub fn get(&self, path: &str) -> Option<&EntryState> {
        let key = path.strip_suffix('/').unwrap_or(path);
        self.lookup.get(key).map(|idx| &self.entries[*idx])
    }

    /// True if `path` is the root or an indexed directory.
    pub fn has_folder(&self, path: &VPath) -> bool {
        path.is_root() || self.get(path.key()).map(|e| e.is_dir()).unwrap_or(false)
    }

    #[inline(always)]
    pub fn entries(&self) -> &[EntryState] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntryState> {
        self.entries.iter()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derives the file and folder trees from the entries in archive order.
    ///
    /// Folders that are never listed but contain listed entries are created
    /// with `implicit` set. A later directory entry for the same path clears
    /// the flag.
    pub fn trees(&self) -> Trees {
        let mut trees = Trees::default();
        trees.folders.insert(VPath::root(), VFolder::new(VPath::root(), 0));

        for entry in &self.entries {
            if entry.path.is_root() {
                continue;
            }

            for key in entry.path.ancestor_keys() {
                let folder = VPath(format!("{}/", key));
                if trees.folders.contains_key(&folder) {
                    continue;
                }
                warn!(path = %folder, "archive does not list parent folder; creating it implicitly");
                attach_folder(&mut trees, &folder);
                trees.folders.insert(folder.clone(), VFolder::implicit(folder));
            }

            match entry.kind {
                EntryKind::Directory => {
                    if let Some(existing) = trees.folders.get_mut(&entry.path) {
                        existing.implicit = false;
                        existing.size = entry.size;
                        continue;
                    }
                    attach_folder(&mut trees, &entry.path);
                    trees.folders.insert(
                        entry.path.clone(),
                        VFolder::new(entry.path.clone(), entry.size),
                    );
                }
                EntryKind::File => {
                    if let Some(parent) = entry
                        .path
                        .parent()
                        .and_then(|p| trees.folders.get_mut(&p))
                    {
                        parent.files.push(entry.path.clone());
                    }
                    trees.files.insert(
                        entry.path.clone(),
                        VFile {
                            path: entry.path.clone(),
                            size: entry.size,
                        },
                    );
                }
            }
        }

        trees
    }
}

fn attach_folder(trees: &mut Trees, folder: &VPath) {
    if let Some(parent) = folder.parent().and_then(|p| trees.folders.get_mut(&p)) {
        parent.sub_folders.push(folder.clone());
    }
}

impl<'a> IntoIterator for &'a Statemap {
    type Item = &'a EntryState;
    type IntoIter = std::slice::Iter<'a, EntryState>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
