use std::fmt;

mod error;

pub use self::error::IntoVPathError;

/// The separator used in `VPath`s regardless of platform.
pub const PATH_SEP: &str = "/";

/// A normalized absolute path inside an archive.
///
/// Always starts with `/`. Folder paths end with `/`, file paths never do,
/// and the root folder is exactly `"/"`.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct VPath(pub(crate) String);

/// Splits a raw archive path into its components.
///
/// Both `/` and `\` separate components. Empty and `.` components are dropped
/// and `..` removes the preceding component.
pub fn sanitize(input: &str) -> Result<Vec<&str>, IntoVPathError> {
    if input.contains(|c: char| c == '\0' || c == '\n' || c == '\r') {
        return Err(IntoVPathError::UnrepresentableStr);
    }

    let mut out = vec![];

    for component in input.split(|c: char| c == '/' || c == '\\') {
        match component {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            component => out.push(component),
        }
    }

    Ok(out)
}

impl VPath {
    pub fn root() -> VPath {
        VPath(PATH_SEP.to_string())
    }

    /// Normalizes `input` as the path of a regular file.
    pub fn file(input: &str) -> Result<VPath, IntoVPathError> {
        let out = sanitize(input)?;

        if out.is_empty() {
            return Err(IntoVPathError::EmptyPath);
        }

        Ok(VPath(format!("{}{}", PATH_SEP, out.join(PATH_SEP))))
    }

    /// Normalizes `input` as the path of a folder. An input with no
    /// components is the root.
    pub fn folder(input: &str) -> Result<VPath, IntoVPathError> {
        let out = sanitize(input)?;

        if out.is_empty() {
            return Ok(VPath::root());
        }

        Ok(VPath(format!("{}{}{}", PATH_SEP, out.join(PATH_SEP), PATH_SEP)))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.0 == PATH_SEP
    }

    #[inline(always)]
    pub fn is_folder(&self) -> bool {
        self.0.ends_with(PATH_SEP)
    }

    /// The path without its trailing separator. Files and folders share this
    /// key space, so `/a` and `/a/` have the same key. The root's key is empty.
    #[inline(always)]
    pub fn key(&self) -> &str {
        self.0.strip_suffix(PATH_SEP).unwrap_or(&self.0)
    }

    /// The parent folder path, including its trailing separator.
    pub fn prefix(&self) -> &str {
        if self.is_root() {
            return PATH_SEP;
        }
        let key = self.key();
        match key.rfind(PATH_SEP) {
            Some(pos) => &key[..=pos],
            None => PATH_SEP,
        }
    }

    /// The last component, without separators. Empty for the root.
    pub fn name(&self) -> &str {
        let key = self.key();
        match key.rfind(PATH_SEP) {
            Some(pos) => &key[pos + 1..],
            None => key,
        }
    }

    pub fn parent(&self) -> Option<VPath> {
        if self.is_root() {
            None
        } else {
            Some(VPath(self.prefix().to_string()))
        }
    }

    /// Keys of every folder between the root and this path, outermost first.
    /// Neither the root nor the path itself is included.
    pub fn ancestor_keys(&self) -> impl Iterator<Item = &str> {
        let key = self.key();
        key.match_indices(PATH_SEP)
            .map(move |(pos, _)| &key[..pos])
            .filter(|k| !k.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.key().split(PATH_SEP).filter(|c| !c.is_empty())
    }
}

impl AsRef<str> for VPath {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitisation() {
        let path = VPath::file("/something/../somethingelse/./foo.txt").unwrap();
        assert_eq!(path.0, "/somethingelse/foo.txt");
        let path = VPath::file("../something/../somethingelse/./foo.txt/.").unwrap();
        assert_eq!(path.0, "/somethingelse/foo.txt");
    }

    #[test]
    fn sanitisation_backslash() {
        // Windows-made archives sometimes carry backslashes
        let path = VPath::file(r"dir\sub\file.txt").unwrap();
        assert_eq!(path.0, "/dir/sub/file.txt");
        let path = VPath::folder(r"dir\sub\").unwrap();
        assert_eq!(path.0, "/dir/sub/");
    }

    #[test]
    fn sanitisation_nul() {
        // NUL is the statemap field separator
        assert_eq!(
            VPath::file("a\0b").unwrap_err(),
            IntoVPathError::UnrepresentableStr
        );
        assert!(VPath::folder("line\nbreak/").is_err());
    }

    #[test]
    fn sanitisation_empty() {
        assert_eq!(VPath::file("").unwrap_err(), IntoVPathError::EmptyPath);
        assert_eq!(VPath::file("./").unwrap_err(), IntoVPathError::EmptyPath);
        assert!(VPath::folder("./").unwrap().is_root());
        assert!(VPath::folder("").unwrap().is_root());
    }

    #[test]
    fn sanitisation_double_slash() {
        let path = VPath::file("/cant/hate//the/path");
        println!("{:?}", path);
        assert_eq!(path.unwrap().0, "/cant/hate/the/path");
    }

    #[test]
    fn sanitisation_icecube_emoji() {
        let path = VPath::folder("///🧊/🧊");
        println!("{:?}", path);
        assert_eq!(path.unwrap().0, "/🧊/🧊/");
    }

    #[test]
    fn prefix_and_name() {
        let path = VPath::file("subdir/file1.txt").unwrap();
        assert_eq!(path.prefix(), "/subdir/");
        assert_eq!(path.name(), "file1.txt");
        assert_eq!(format!("{}{}", path.prefix(), path.name()), path.as_str());

        let path = VPath::folder("a/b").unwrap();
        assert_eq!(path.as_str(), "/a/b/");
        assert_eq!(path.prefix(), "/a/");
        assert_eq!(path.name(), "b");

        let root = VPath::root();
        assert_eq!(root.prefix(), "/");
        assert_eq!(root.name(), "");
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn keys_are_shared() {
        let file = VPath::file("a").unwrap();
        let folder = VPath::folder("a").unwrap();
        assert_ne!(file, folder);
        assert_eq!(file.key(), folder.key());
        assert_eq!(VPath::root().key(), "");
    }

    #[test]
    fn ancestors() {
        let path = VPath::file("a/b/c.txt").unwrap();
        assert_eq!(path.ancestor_keys().collect::<Vec<_>>(), vec!["/a", "/a/b"]);
        assert_eq!(path.depth(), 3);
        assert_eq!(
            path.parent().unwrap(),
            VPath::folder("a/b").unwrap()
        );

        let top = VPath::folder("top").unwrap();
        assert_eq!(top.ancestor_keys().count(), 0);
        assert!(top.parent().unwrap().is_root());
    }
}
