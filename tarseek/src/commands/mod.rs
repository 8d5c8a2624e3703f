pub mod cat;
pub mod list;
pub mod rebuild;

pub use cat::run as cat;
pub use list::run as list;
pub use rebuild::run as rebuild;

use tarseek_format::{find_extractor, Extractor};

use crate::cli::ArchiveArgs;
use crate::error::{Error, Result};

/// Opens the archive without touching its statemap.
fn open_archive(args: &ArchiveArgs) -> Result<Box<dyn Extractor>> {
    find_extractor(&args.options())
        .map_err(|source| Error::OpenArchive {
            path: args.path.clone(),
            source,
        })?
        .ok_or_else(|| Error::UnknownFormat {
            path: args.path.clone(),
        })
}

/// Opens the archive and loads or builds its statemap.
fn open_indexed(args: &ArchiveArgs) -> Result<Box<dyn Extractor>> {
    let mut extractor = open_archive(args)?;
    extractor.initialize().map_err(|source| Error::Index {
        path: args.path.clone(),
        source,
    })?;
    Ok(extractor)
}
