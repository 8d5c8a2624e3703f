use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, info};

use super::{Confidence, Extractor, ExtractorFormat, ExtractorOptions, OpenError};
use crate::persist::{self, StatemapError};
use crate::read::{self, ReadError, ReadOutput};
use crate::scan::{self, ScanError};
use crate::statemap::{EntryState, Statemap};
use crate::tree::{FileList, FolderList, Trees, VFile};

/// Smallest archive worth opening: one header block and the end marker.
pub const MIN_ARCHIVE_SIZE: u64 = 1024;

const MAGIC_OFFSET: u64 = 257;

#[derive(Debug)]
pub struct TarExtractor {
    options: ExtractorOptions,
    statemap: Statemap,
    trees: Trees,
    initialized: bool,
}

impl TarExtractor {
    pub fn new(options: ExtractorOptions) -> Result<TarExtractor, OpenError> {
        let path = options.archive_path();
        let size = fs::metadata(path)
            .map_err(|e| OpenError::Metadata(e, path.to_path_buf()))?
            .len();

        if size < MIN_ARCHIVE_SIZE {
            return Err(OpenError::TooSmall {
                path: path.to_path_buf(),
                size,
            });
        }

        Ok(TarExtractor {
            options,
            statemap: Statemap::new(),
            trees: Trees::default(),
            initialized: false,
        })
    }

    /// Whether the archive looks like a tar file by name and size.
    pub fn check_compatibility(options: &ExtractorOptions) -> bool {
        let path = options.archive_path();
        let is_tar = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("tar"))
            .unwrap_or(false);
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        is_tar && size >= MIN_ARCHIVE_SIZE
    }

    pub fn trees(&self) -> &Trees {
        &self.trees
    }

    fn set_statemap(&mut self, statemap: Statemap) {
        self.trees = statemap.trees();
        self.statemap = statemap;
        self.initialized = true;
    }

    fn entry(&self, file: &VFile) -> Result<&EntryState, ReadError> {
        self.statemap
            .get(file.path.key())
            .filter(|e| e.is_file())
            .ok_or_else(|| ReadError::NotFound(file.path.to_string()))
    }
}

impl Extractor for TarExtractor {
    fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn statemap(&self) -> &Statemap {
        &self.statemap
    }

    fn file_list(&self) -> &FileList {
        &self.trees.files
    }

    fn folder_list(&self) -> &FolderList {
        &self.trees.folders
    }

    fn read(&self, file: &VFile, length: usize, offset: u64) -> Result<ReadOutput, ReadError> {
        let entry = self.entry(file)?;
        read::read_entry(self.options.archive_path(), entry, length, offset)
    }

    fn open(&self, file: &VFile) -> Result<Box<dyn Read + Send>, ReadError> {
        let entry = self.entry(file)?;
        Ok(Box::new(read::open_entry(self.options.archive_path(), entry)?))
    }

    fn load_statemap(&mut self) -> Result<bool, StatemapError> {
        match persist::load_statemap(&self.options.statemap_path())? {
            Some(statemap) => {
                self.set_statemap(statemap);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn write_statemap(&self) -> Result<(), StatemapError> {
        persist::write_statemap(&self.options.statemap_path(), &self.statemap)
    }

    fn generate_statemap(&mut self) -> Result<(), ScanError> {
        let statemap = scan::scan_path(self.options.archive_path(), self.options.scan_options())?;
        info!(
            archive = %self.options.archive_path().display(),
            files = statemap.iter().filter(|e| e.is_file()).count(),
            "generated statemap"
        );
        self.set_statemap(statemap);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TarFormat;

impl TarFormat {
    fn has_magic(options: &ExtractorOptions) -> bool {
        let mut magic = [0u8; 5];
        let result = File::open(options.archive_path()).and_then(|mut f| {
            f.seek(SeekFrom::Start(MAGIC_OFFSET))?;
            f.read_exact(&mut magic)
        });
        result.is_ok() && &magic == b"ustar"
    }
}

impl ExtractorFormat for TarFormat {
    fn name(&self) -> &'static str {
        "tar"
    }

    fn probe(&self, options: &ExtractorOptions) -> Confidence {
        let size = match fs::metadata(options.archive_path()) {
            Ok(m) => m.len(),
            Err(e) => {
                debug!(error = %e, "cannot probe archive");
                return Confidence::None;
            }
        };
        if size < MIN_ARCHIVE_SIZE {
            return Confidence::None;
        }

        if TarFormat::has_magic(options) {
            Confidence::Magic
        } else if TarExtractor::check_compatibility(options) {
            Confidence::Extension
        } else {
            Confidence::None
        }
    }

    fn open(&self, options: &ExtractorOptions) -> Result<Box<dyn Extractor>, OpenError> {
        Ok(Box::new(TarExtractor::new(options.clone())?))
    }
}
