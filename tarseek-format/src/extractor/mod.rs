use std::ffi::OsString;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::path::VPath;
use crate::persist::StatemapError;
use crate::read::{ReadError, ReadOutput};
use crate::scan::{ScanError, ScanOptions};
use crate::statemap::Statemap;
use crate::tree::{FileList, FolderList, VFile};
use crate::Error;

mod tar;

pub use self::tar::{TarExtractor, TarFormat, MIN_ARCHIVE_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Archive is too small to be valid ({size} bytes). Path: '{}'", .path.display())]
    TooSmall { path: PathBuf, size: u64 },

    #[error("Could not read archive metadata. Path: '{}'", .1.display())]
    Metadata(#[source] std::io::Error, PathBuf),
}

/// Where the archive is and how it should be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorOptions {
    archive_path: PathBuf,
    statemap_path: Option<PathBuf>,
    scan: ScanOptions,
}

impl ExtractorOptions {
    pub fn new<P: Into<PathBuf>>(archive_path: P) -> ExtractorOptions {
        ExtractorOptions {
            archive_path: archive_path.into(),
            statemap_path: None,
            scan: ScanOptions::default(),
        }
    }

    pub fn with_statemap_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.statemap_path = Some(path.into());
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.scan.verify_checksums = verify;
        self
    }

    pub fn strict_parents(mut self, strict: bool) -> Self {
        self.scan.strict_parents = strict;
        self
    }

    #[inline(always)]
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    #[inline(always)]
    pub fn scan_options(&self) -> &ScanOptions {
        &self.scan
    }

    /// The statemap location, `<archive>.statemap` unless set explicitly.
    pub fn statemap_path(&self) -> PathBuf {
        match &self.statemap_path {
            Some(path) => path.clone(),
            None => {
                let mut path = OsString::from(self.archive_path.as_os_str());
                path.push(".statemap");
                PathBuf::from(path)
            }
        }
    }
}

/// Random access to the files of an indexed archive.
pub trait Extractor: fmt::Debug + Send + Sync {
    fn options(&self) -> &ExtractorOptions;

    fn is_initialized(&self) -> bool;

    /// Makes the index available, loading the persisted statemap when there
    /// is one and scanning the archive otherwise. Does nothing if already
    /// initialized.
    fn initialize(&mut self) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }

        if self.load_statemap()? {
            return Ok(());
        }

        debug!(archive = %self.options().archive_path().display(), "no statemap found, scanning");
        self.generate_statemap()?;
        self.write_statemap()?;
        Ok(())
    }

    /// Rescans the archive and replaces the persisted statemap.
    fn rebuild(&mut self) -> Result<(), Error> {
        self.generate_statemap()?;
        self.write_statemap()?;
        Ok(())
    }

    fn statemap(&self) -> &Statemap;

    fn file_list(&self) -> &FileList;

    fn folder_list(&self) -> &FolderList;

    fn read(&self, file: &VFile, length: usize, offset: u64) -> Result<ReadOutput, ReadError>;

    /// Streams the whole content of `file`.
    fn open(&self, file: &VFile) -> Result<Box<dyn Read + Send>, ReadError>;

    fn read_path(&self, path: &str, length: usize, offset: u64) -> Result<ReadOutput, ReadError> {
        let file = VPath::file(path)
            .ok()
            .and_then(|p| self.file_list().get(&p))
            .ok_or_else(|| ReadError::NotFound(path.to_string()))?;
        self.read(file, length, offset)
    }

    /// Loads the persisted statemap. Returns `false` if there is none.
    fn load_statemap(&mut self) -> Result<bool, StatemapError>;

    fn write_statemap(&self) -> Result<(), StatemapError>;

    fn generate_statemap(&mut self) -> Result<(), ScanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    None,
    Extension,
    Magic,
}

/// An archive format that can be recognised and opened.
pub trait ExtractorFormat: Sync {
    fn name(&self) -> &'static str;

    fn probe(&self, options: &ExtractorOptions) -> Confidence;

    fn open(&self, options: &ExtractorOptions) -> Result<Box<dyn Extractor>, OpenError>;
}

/// Known formats, in priority order.
pub static FORMATS: &[&dyn ExtractorFormat] = &[&TarFormat];

/// Opens the archive with the format that recognises it most confidently.
/// Returns `Ok(None)` if no format recognises it.
pub fn find_extractor(
    options: &ExtractorOptions,
) -> Result<Option<Box<dyn Extractor>>, OpenError> {
    let mut best: Option<(Confidence, &dyn ExtractorFormat)> = None;

    for format in FORMATS {
        let confidence = format.probe(options);
        if confidence == Confidence::None {
            continue;
        }
        if best.map(|(c, _)| confidence > c).unwrap_or(true) {
            best = Some((confidence, *format));
        }
    }

    match best {
        Some((confidence, format)) => {
            debug!(format = format.name(), ?confidence, "selected extractor");
            format.open(options).map(Some)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_statemap_path() {
        let options = ExtractorOptions::new("/data/backup.tar");
        assert_eq!(
            options.statemap_path(),
            PathBuf::from("/data/backup.tar.statemap")
        );

        let options = options.with_statemap_path("/tmp/custom");
        assert_eq!(options.statemap_path(), PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn builder() {
        let options = ExtractorOptions::new("a.tar")
            .verify_checksums(false)
            .strict_parents(true);
        assert!(!options.scan_options().verify_checksums);
        assert!(options.scan_options().strict_parents);
        assert_eq!(options.archive_path(), Path::new("a.tar"));
    }

    #[test]
    fn confidence_order() {
        assert!(Confidence::Magic > Confidence::Extension);
        assert!(Confidence::Extension > Confidence::None);
    }

    #[test]
    fn extractors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TarExtractor>();
        assert_send_sync::<TarFormat>();
    }
}
