use std::collections::HashMap;

use crate::path::VPath;

/// A regular file as presented by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VFile {
    pub path: VPath,
    pub size: u64,
}

/// A folder and the paths of its direct children.
///
/// Children are listed in archive order. `implicit` is set for folders that
/// the archive never listed but which are ancestors of something it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VFolder {
    pub path: VPath,
    pub size: u64,
    pub sub_folders: Vec<VPath>,
    pub files: Vec<VPath>,
    pub implicit: bool,
}

impl VFolder {
    pub fn new(path: VPath, size: u64) -> VFolder {
        VFolder {
            path,
            size,
            sub_folders: vec![],
            files: vec![],
            implicit: false,
        }
    }

    pub(crate) fn implicit(path: VPath) -> VFolder {
        VFolder {
            implicit: true,
            ..VFolder::new(path, 0)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sub_folders.is_empty() && self.files.is_empty()
    }
}

pub type FileList = HashMap<VPath, VFile>;
pub type FolderList = HashMap<VPath, VFolder>;

/// File and folder views derived from a statemap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trees {
    pub files: FileList,
    pub folders: FolderList,
}

impl Trees {
    pub fn root(&self) -> Option<&VFolder> {
        self.folders.get(&VPath::root())
    }

    pub fn file(&self, path: &VPath) -> Option<&VFile> {
        self.files.get(path)
    }

    pub fn folder(&self, path: &VPath) -> Option<&VFolder> {
        self.folders.get(path)
    }

    /// Walks the folder tree depth first from the root, yielding each folder
    /// before its children.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            trees: self,
            stack: vec![VPath::root()],
        }
    }
}

pub struct Walk<'a> {
    trees: &'a Trees,
    stack: Vec<VPath>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a VFolder;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.stack.pop()?;
            let folder = match self.trees.folders.get(&path) {
                Some(v) => v,
                None => continue,
            };
            self.stack.extend(folder.sub_folders.iter().rev().cloned());
            return Some(folder);
        }
    }
}
