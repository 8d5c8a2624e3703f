use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::header::{self, PendingNames, TypeFlag, BLOCK_LEN, BLOCK_SIZE};
use crate::path::{IntoVPathError, VPath};
use crate::statemap::{EntryKind, EntryState, InsertError, Statemap};

/// Upper bound for the content of a GNU long name or PAX record.
pub const MAX_METADATA_LEN: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Unsupported archive: {0}")]
    Unsupported(String),

    #[error("Duplicate path found in archive; hardlinks and symlinks are not supported. Path: '{path}'")]
    Duplicate { path: VPath },

    #[error("Path '{path}' is used as both a file and a folder")]
    Conflict { path: VPath },

    #[error("Archive is corrupted: {reason} (header position: 0x{position:X})")]
    Corrupted { position: u64, reason: String },

    #[error("Invalid path in header (header position: 0x{position:X})")]
    InvalidPath {
        position: u64,
        #[source]
        source: IntoVPathError,
    },

    #[error("Parent folder of '{path}' has not been listed in the archive")]
    MissingParent { path: VPath },

    #[error("IO error")]
    Io(#[from] io::Error),
}

impl From<InsertError> for ScanError {
    fn from(err: InsertError) -> Self {
        match err {
            InsertError::Duplicate(path) => ScanError::Duplicate { path },
            InsertError::Conflict(path) => ScanError::Conflict { path },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Reject headers whose checksum does not match.
    pub verify_checksums: bool,
    /// Reject entries whose parent folder was not listed before them.
    pub strict_parents: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            verify_checksums: true,
            strict_parents: false,
        }
    }
}

pub fn scan_path(path: &Path, options: &ScanOptions) -> Result<Statemap, ScanError> {
    let file = File::open(path)?;
    let map = scan_archive(BufReader::new(file), options)?;
    info!(archive = %path.display(), entries = map.len(), "scanned archive");
    Ok(map)
}

/// Builds the index of a tar archive by walking its headers from the start.
///
/// Nothing is returned unless the whole archive scans cleanly.
pub fn scan_archive<R: Read + Seek>(
    mut reader: R,
    options: &ScanOptions,
) -> Result<Statemap, ScanError> {
    let archive_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut map = Statemap::new();
    let mut pending = PendingNames::default();
    let mut block = [0u8; BLOCK_LEN];
    let mut position = 0u64;

    loop {
        let n = read_block(&mut reader, &mut block)?;
        if n == 0 {
            break;
        }
        if n < BLOCK_LEN {
            return Err(ScanError::Corrupted {
                position,
                reason: "not enough space to fit header".into(),
            });
        }

        if header::is_zero_block(&block) {
            end_of_archive(&mut reader, &mut block, position)?;
            break;
        }

        let raw = header::parse_header(&block, position, options.verify_checksums)?;
        let offset = position + BLOCK_SIZE;
        let next = offset
            .checked_add(padded_len(raw.size))
            .ok_or_else(|| ScanError::Unsupported("archive exceeds supported size".into()))?;

        if offset.saturating_add(raw.size) > archive_len {
            return Err(ScanError::Corrupted {
                position,
                reason: format!(
                    "entry content of {} bytes extends past the end of the archive",
                    raw.size
                ),
            });
        }

        match raw.type_flag.entry_kind() {
            None => {
                let data = read_metadata(&mut reader, raw.size, position)?;
                match raw.type_flag {
                    TypeFlag::GnuLongName => pending.set_long_name(&data),
                    TypeFlag::PaxExtended => {
                        pending.pax_path = header::parse_pax_records(&data, position)?;
                    }
                    TypeFlag::PaxGlobal => {
                        pending.global_path = header::parse_pax_records(&data, position)?;
                    }
                    TypeFlag::File | TypeFlag::Directory => {}
                }
                debug!(
                    position,
                    type_flag = %raw.type_flag,
                    size = raw.size,
                    "metadata record"
                );
            }
            Some(kind) => {
                let name = pending.resolve(raw.name);
                let path = match kind {
                    EntryKind::File => VPath::file(&name),
                    EntryKind::Directory => VPath::folder(&name),
                }
                .map_err(|source| ScanError::InvalidPath { position, source })?;

                debug!(
                    position,
                    type_flag = %raw.type_flag,
                    size = raw.size,
                    path = %path,
                    "entry"
                );

                if path.is_root() {
                    debug!(position, "skipping root folder entry");
                } else {
                    if options.strict_parents {
                        let has_parent = path
                            .parent()
                            .map(|parent| map.has_folder(&parent))
                            .unwrap_or(true);
                        if !has_parent {
                            return Err(ScanError::MissingParent { path });
                        }
                    }

                    map.insert(EntryState {
                        path,
                        offset,
                        size: raw.size,
                        kind,
                    })?;
                }
            }
        }

        position = next;
        reader.seek(SeekFrom::Start(position))?;
    }

    Ok(map)
}

#[inline(always)]
fn padded_len(size: u64) -> u64 {
    match size % BLOCK_SIZE {
        0 => size,
        rem => size.saturating_add(BLOCK_SIZE - rem),
    }
}

/// Reads up to one block, returning how many bytes were read. Only a short
/// count at end of file is possible.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_LEN]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < BLOCK_LEN {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_metadata<R: Read>(reader: &mut R, size: u64, position: u64) -> Result<Vec<u8>, ScanError> {
    if size > MAX_METADATA_LEN {
        return Err(ScanError::Unsupported(format!(
            "metadata record of {} bytes at 0x{:X} exceeds the {} byte limit",
            size, position, MAX_METADATA_LEN
        )));
    }

    let mut data = vec![0u8; size as usize];
    reader.read_exact(&mut data).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ScanError::Corrupted {
            position,
            reason: "metadata record is truncated".into(),
        },
        _ => ScanError::Io(e),
    })?;
    Ok(data)
}

/// Called after a zero block. A second zero block or end of file is the
/// regular end marker.
fn end_of_archive<R: Read>(
    reader: &mut R,
    block: &mut [u8; BLOCK_LEN],
    position: u64,
) -> io::Result<()> {
    let n = read_block(reader, block)?;
    if n > 0 && !header::is_zero_block(&block[..n]) {
        warn!(
            position,
            "single zero block followed by more data; treating it as end of archive"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::block;
    use std::io::Cursor;

    fn archive(parts: &[&[u8]]) -> Cursor<Vec<u8>> {
        let mut out = vec![];
        for part in parts {
            out.extend_from_slice(part);
            let rem = out.len() % BLOCK_LEN;
            if rem != 0 {
                out.resize(out.len() + BLOCK_LEN - rem, 0);
            }
        }
        Cursor::new(out)
    }

    const ZERO: [u8; BLOCK_LEN] = [0u8; BLOCK_LEN];

    #[test]
    fn offsets_and_sizes() {
        let data = archive(&[
            &block("dir/", 0, b'5', true),
            &block("dir/a.txt", 10, b'0', true),
            b"0123456789",
            &block("dir/b.txt", 600, b'0', true),
            &[7u8; 600],
            &ZERO,
            &ZERO,
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        let entries = map.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path.as_str(), "/dir/");
        assert_eq!(entries[1].offset, 1024);
        assert_eq!(entries[1].size, 10);
        assert_eq!(entries[2].offset, 2048);
        assert_eq!(entries[2].size, 600);
    }

    #[test]
    fn eof_at_block_boundary_ends_scan() {
        let data = archive(&[&block("a", 3, b'0', true), b"abc"]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn partial_header_is_corrupted() {
        let mut data = archive(&[&block("a", 3, b'0', true), b"abc"]).into_inner();
        data.extend_from_slice(&[1u8; 100]);
        let err = scan_archive(Cursor::new(data), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::Corrupted { position: 1024, .. }));
    }

    #[test]
    fn lone_zero_block_ends_scan() {
        let data = archive(&[
            &block("a", 0, b'0', true),
            &ZERO,
            &block("b", 0, b'0', true),
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn content_past_end_is_corrupted() {
        let data = archive(&[&block("a", 4096, b'0', true), b"short"]);
        let err = scan_archive(data, &ScanOptions::default()).unwrap_err();
        println!("{}", err);
        assert!(matches!(err, ScanError::Corrupted { position: 0, .. }));
    }

    #[test]
    fn pax_path_overrides_next_entry_only() {
        let pax = b"25 path=subdir/file1.txt\n";
        let data = archive(&[
            &block("PaxHeaders/file1", pax.len() as u64, b'x', true),
            pax,
            &block("short1", 0, b'0', true),
            &block("short2", 0, b'0', true),
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        let paths: Vec<_> = map.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/subdir/file1.txt", "/short2"]);
    }

    #[test]
    fn pax_record_without_path_clears_pending_path() {
        let pax = b"17 path=pax-name\n";
        let uid = b"12 uid=1000\n";
        let data = archive(&[
            &block("PaxHeaders/a", pax.len() as u64, b'x', true),
            pax,
            &block("PaxHeaders/b", uid.len() as u64, b'x', true),
            uid,
            &block("first", 0, b'0', true),
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        let paths: Vec<_> = map.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/first"]);
    }

    #[test]
    fn long_name_consumes_pending_pax_path() {
        let long = b"long-name\0";
        let pax = b"17 path=pax-name\n";
        let data = archive(&[
            &block("././@LongLink", long.len() as u64, b'L', false),
            long,
            &block("PaxHeaders/a", pax.len() as u64, b'x', true),
            pax,
            &block("first", 0, b'0', true),
            &block("second", 0, b'0', true),
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        let paths: Vec<_> = map.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/long-name", "/second"]);
    }

    #[test]
    fn global_pax_path_persists() {
        let global = b"17 path=shared.d\n";
        let clear = b"12 uid=1000\n";
        let data = archive(&[
            &block("pax_global_header", global.len() as u64, b'g', true),
            global,
            &block("first", 0, b'5', true),
            &block("pax_global_header", clear.len() as u64, b'g', true),
            clear,
            &block("second", 0, b'0', true),
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        let paths: Vec<_> = map.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/shared.d/", "/second"]);
    }

    #[test]
    fn global_pax_path_collides_on_second_entry() {
        let global = b"17 path=shared.d\n";
        let data = archive(&[
            &block("pax_global_header", global.len() as u64, b'g', true),
            global,
            &block("first", 0, b'0', true),
            &block("second", 0, b'0', true),
        ]);
        let err = scan_archive(data, &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::Duplicate { .. }));
    }

    #[test]
    fn long_name_record() {
        let long = format!("{}/file.txt\0", "d".repeat(120));
        let data = archive(&[
            &block("././@LongLink", long.len() as u64, b'L', false),
            long.as_bytes(),
            &block("truncated", 2, b'0', false),
            b"hi",
        ]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        assert_eq!(
            map.entries()[0].path.as_str(),
            format!("/{}/file.txt", "d".repeat(120))
        );
        assert_eq!(map.entries()[0].offset, 1536);
    }

    #[test]
    fn root_folder_entries_are_skipped() {
        let data = archive(&[&block("./", 0, b'5', false), &block("./a", 0, b'0', false)]);
        let map = scan_archive(data, &ScanOptions::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.entries()[0].path.as_str(), "/a");
    }

    #[test]
    fn file_at_root_is_invalid() {
        let data = archive(&[&block("./", 0, b'0', false)]);
        let err = scan_archive(data, &ScanOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidPath {
                source: IntoVPathError::EmptyPath,
                ..
            }
        ));
    }

    #[test]
    fn strict_parents() {
        let parts: &[&[u8]] = &[&block("a/b.txt", 0, b'0', true), &block("a/", 0, b'5', true)];

        let map = scan_archive(archive(parts), &ScanOptions::default()).unwrap();
        assert_eq!(map.len(), 2);

        let options = ScanOptions {
            strict_parents: true,
            ..ScanOptions::default()
        };
        let err = scan_archive(archive(parts), &options).unwrap_err();
        assert!(matches!(err, ScanError::MissingParent { .. }));

        let ordered: &[&[u8]] = &[&block("a/", 0, b'5', true), &block("a/b.txt", 0, b'0', true)];
        assert_eq!(scan_archive(archive(ordered), &options).unwrap().len(), 2);
    }

    #[test]
    fn oversized_metadata_is_unsupported() {
        let mut header = block("././@LongLink", 0, b'L', false);
        let size = format!("{:011o}", MAX_METADATA_LEN + 1);
        header[124..135].copy_from_slice(size.as_bytes());
        crate::header::tests::seal(&mut header);

        let mut data = header.to_vec();
        data.resize(data.len() + MAX_METADATA_LEN as usize + 1024, 0);
        let err = scan_archive(Cursor::new(data), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::Unsupported(_)));
    }
}
