//! Reading and writing the statemap sidecar file.
//!
//! Each entry is one line of four NUL-separated fields: the type flag, the
//! absolute path, the content offset and the content size. Lines starting
//! with `#` and blank lines are ignored when loading.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::path::VPath;
use crate::statemap::{EntryKind, EntryState, InsertError, Statemap};

const FIELD_SEP: char = '\0';

const HEADER: &str = "\
# This is a statemap file that helps to read contents of a tar file
# In a format that is
# (filetype)(null)(fullfilepath)(null)(offset)(null)(filesize)
# filetype 0 means normal file, 5 means folder
# (null) means a real null character \\0
# Please don't modify this file or programs that depend on it might fail
";

#[derive(Debug, thiserror::Error)]
pub enum StatemapError {
    #[error("Statemap I/O failed for path: '{}'", .1.display())]
    Io(#[source] io::Error, PathBuf),

    #[error("Malformed statemap at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Writes `map` to `path`, replacing any existing file atomically.
pub fn write_statemap(path: &Path, map: &Statemap) -> Result<(), StatemapError> {
    let io_err = |e: io::Error| StatemapError::Io(e, path.to_path_buf());

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    let mut writer = BufWriter::new(tmp);

    writer.write_all(HEADER.as_bytes()).map_err(io_err)?;
    for entry in map {
        writeln!(
            writer,
            "{}{sep}{}{sep}{}{sep}{}",
            entry.kind.as_char(),
            entry.path,
            entry.offset,
            entry.size,
            sep = FIELD_SEP
        )
        .map_err(io_err)?;
    }

    let tmp = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!(statemap = %path.display(), entries = map.len(), "wrote statemap");
    Ok(())
}

/// Loads a statemap. A missing file is `Ok(None)`.
pub fn load_statemap(path: &Path) -> Result<Option<Statemap>, StatemapError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StatemapError::Io(e, path.to_path_buf())),
    };

    let map = read_statemap(BufReader::new(file), path)?;
    debug!(statemap = %path.display(), entries = map.len(), "loaded statemap");
    Ok(Some(map))
}

fn read_statemap<R: BufRead>(reader: R, path: &Path) -> Result<Statemap, StatemapError> {
    let mut map = Statemap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => StatemapError::Malformed {
                line: line_no,
                reason: "line is not valid UTF-8".into(),
            },
            _ => StatemapError::Io(e, path.to_path_buf()),
        })?;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = parse_line(&line).map_err(|reason| StatemapError::Malformed {
            line: line_no,
            reason,
        })?;

        map.insert(entry).map_err(|e| StatemapError::Malformed {
            line: line_no,
            reason: match e {
                InsertError::Duplicate(p) => format!("duplicate path '{}'", p),
                e @ InsertError::Conflict(_) => e.to_string(),
            },
        })?;
    }

    Ok(map)
}

fn parse_line(line: &str) -> Result<EntryState, String> {
    let fields: Vec<&str> = line.split(FIELD_SEP).collect();
    let [kind, path, offset, size] = fields[..] else {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    };

    let mut chars = kind.chars();
    let kind = match (chars.next(), chars.next()) {
        (Some(c), None) => EntryKind::from_char(c),
        _ => None,
    }
    .ok_or_else(|| format!("unknown entry type '{}'", kind))?;

    let path = match kind {
        EntryKind::File => VPath::file(path),
        EntryKind::Directory => VPath::folder(path),
    }
    .map_err(|e| format!("invalid path '{}': {}", path, e))?;

    let offset = offset
        .parse::<u64>()
        .map_err(|e| format!("invalid offset '{}': {}", offset, e))?;
    let size = size
        .parse::<u64>()
        .map_err(|e| format!("invalid size '{}': {}", size, e))?;

    if offset.checked_add(size).is_none() {
        return Err(format!(
            "entry at offset {} with size {} exceeds the addressable range",
            offset, size
        ));
    }

    Ok(EntryState {
        path,
        offset,
        size,
        kind,
    })
}
