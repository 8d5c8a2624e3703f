//! Seekable access to tar archives.
//!
//! An archive is scanned once to build a statemap, an index of every file and
//! folder with the offset and size of its content. The statemap is persisted
//! next to the archive so later runs can skip the scan, and reads go straight
//! to the indexed offsets.

pub mod codec;
pub mod extractor;
pub mod header;
pub mod path;
pub mod persist;
pub mod read;
pub mod scan;
pub mod statemap;
pub mod tree;

pub use extractor::{
    find_extractor, Confidence, Extractor, ExtractorFormat, ExtractorOptions, OpenError,
    TarExtractor, TarFormat,
};
pub use path::VPath;
pub use persist::{load_statemap, write_statemap, StatemapError};
pub use read::{ReadError, ReadOutput};
pub use scan::{scan_archive, scan_path, ScanError, ScanOptions};
pub use statemap::{EntryKind, EntryState, Statemap};
pub use tree::{FileList, FolderList, Trees, VFile, VFolder};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Statemap(#[from] StatemapError),

    #[error(transparent)]
    Read(#[from] ReadError),
}
