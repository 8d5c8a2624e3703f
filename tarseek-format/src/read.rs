use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::statemap::EntryState;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("No file with path '{0}' in the archive")]
    NotFound(String),

    #[error("Failed to read from archive: '{}'", .1.display())]
    ReadFailed(#[source] io::Error, PathBuf),
}

/// Bytes returned by a positioned read.
///
/// `data` always has the requested length. Only the first `bytes_read`
/// bytes come from the archive; the rest are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutput {
    pub data: Vec<u8>,
    pub bytes_read: usize,
}

impl ReadOutput {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.bytes_read]
    }
}

/// Reads up to `length` bytes of `entry`, starting `offset` bytes into its
/// content. Reading at or past the end of the entry returns no bytes.
pub fn read_entry(
    archive: &Path,
    entry: &EntryState,
    length: usize,
    offset: u64,
) -> Result<ReadOutput, ReadError> {
    let remaining = entry.size.saturating_sub(offset);
    let actual = remaining.min(length as u64) as usize;
    let mut data = vec![0u8; length];

    if actual == 0 {
        return Ok(ReadOutput {
            data,
            bytes_read: 0,
        });
    }

    let err = |e| ReadError::ReadFailed(e, archive.to_path_buf());
    let start = content_position(entry, offset).map_err(err)?;
    let mut file = File::open(archive).map_err(err)?;
    file.seek(SeekFrom::Start(start)).map_err(err)?;

    let mut bytes_read = 0;
    while bytes_read < actual {
        match file.read(&mut data[bytes_read..actual]) {
            Ok(0) => break,
            Ok(n) => bytes_read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(err(e)),
        }
    }

    trace!(path = %entry.path, offset, length, bytes_read, "read");
    Ok(ReadOutput { data, bytes_read })
}

/// Opens a reader over the whole content of `entry`.
pub fn open_entry(archive: &Path, entry: &EntryState) -> Result<Take<File>, ReadError> {
    let err = |e| ReadError::ReadFailed(e, archive.to_path_buf());
    content_position(entry, entry.size).map_err(err)?;
    let mut file = File::open(archive).map_err(err)?;
    file.seek(SeekFrom::Start(entry.offset)).map_err(err)?;
    Ok(file.take(entry.size))
}

/// Memory maps the content of `entry`.
///
/// # Safety
///
/// The archive must not be modified or truncated while the map is alive.
pub unsafe fn memory_map(
    archive: &Path,
    entry: &EntryState,
) -> Result<memmap2::Mmap, ReadError> {
    let err = |e| ReadError::ReadFailed(e, archive.to_path_buf());
    content_position(entry, entry.size).map_err(err)?;
    let len = usize::try_from(entry.size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "entry too large to map"))
        .map_err(err)?;
    let file = File::open(archive).map_err(err)?;
    memmap2::MmapOptions::new()
        .offset(entry.offset)
        .len(len)
        .map(&file)
        .map_err(err)
}

/// Absolute archive position of byte `offset` of `entry`'s content.
fn content_position(entry: &EntryState, offset: u64) -> io::Result<u64> {
    entry.offset.checked_add(offset).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("entry '{}' lies beyond the addressable range", entry.path),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::VPath;
    use crate::statemap::EntryKind;
    use std::io::Write;

    fn fixture() -> (tempfile::NamedTempFile, EntryState) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 512]).unwrap();
        file.write_all(b"0123456789").unwrap();
        file.write_all(&[0u8; 502]).unwrap();
        file.flush().unwrap();

        let entry = EntryState {
            path: VPath::file("ten.txt").unwrap(),
            offset: 512,
            size: 10,
            kind: EntryKind::File,
        };
        (file, entry)
    }

    #[test]
    fn read_clamps_to_size() {
        let (file, entry) = fixture();

        let out = read_entry(file.path(), &entry, 30, 0).unwrap();
        assert_eq!(out.bytes_read, 10);
        assert_eq!(out.data.len(), 30);
        assert_eq!(out.bytes(), b"0123456789");
        assert!(out.data[10..].iter().all(|b| *b == 0));

        let out = read_entry(file.path(), &entry, 5, 8).unwrap();
        assert_eq!(out.bytes_read, 2);
        assert_eq!(&out.data, b"89\0\0\0");
    }

    #[test]
    fn read_past_end() {
        let (file, entry) = fixture();
        let out = read_entry(file.path(), &entry, 4, 10).unwrap();
        assert_eq!(out.bytes_read, 0);
        let out = read_entry(file.path(), &entry, 4, 100).unwrap();
        assert_eq!(out.bytes_read, 0);
        assert_eq!(out.data, vec![0u8; 4]);
    }

    #[test]
    fn missing_archive() {
        let (_, entry) = fixture();
        let err = read_entry(Path::new("/nonexistent/archive.tar"), &entry, 4, 0).unwrap_err();
        assert!(matches!(err, ReadError::ReadFailed(_, _)));
    }

    #[test]
    fn offset_overflow_is_an_error() {
        let (file, mut entry) = fixture();
        entry.offset = u64::MAX - 2;

        let err = read_entry(file.path(), &entry, 5, 4).unwrap_err();
        match err {
            ReadError::ReadFailed(e, _) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(matches!(
            open_entry(file.path(), &entry),
            Err(ReadError::ReadFailed(_, _))
        ));
        assert!(matches!(
            unsafe { memory_map(file.path(), &entry) },
            Err(ReadError::ReadFailed(_, _))
        ));
    }

    #[test]
    fn streaming_and_mapping() {
        let (file, entry) = fixture();

        let mut buf = String::new();
        open_entry(file.path(), &entry)
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "0123456789");

        let map = unsafe { memory_map(file.path(), &entry).unwrap() };
        assert_eq!(&map[..], b"0123456789");
    }
}
