//! Decoding of individual tar header blocks and the metadata records that
//! precede entries.

use std::fmt;

use tracing::trace;

use crate::codec::{self, NumberError};
use crate::scan::ScanError;
use crate::statemap::EntryKind;

pub const BLOCK_SIZE: u64 = 512;
pub(crate) const BLOCK_LEN: usize = BLOCK_SIZE as usize;

/// Magic bytes of a POSIX ustar header, as rendered by
/// [`codec::encode_to_string`].
const USTAR_MAGIC: &str = "75 73 74 61 72 00";

const NAME: std::ops::Range<usize> = 0..100;
const SIZE: std::ops::Range<usize> = 124..136;
const CHECKSUM: std::ops::Range<usize> = 148..156;
const TYPE_FLAG: usize = 156;
const MAGIC: std::ops::Range<usize> = 257..263;
const PREFIX: std::ops::Range<usize> = 345..500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFlag {
    File,
    Directory,
    GnuLongName,
    PaxExtended,
    PaxGlobal,
}

impl TypeFlag {
    pub fn from_byte(byte: u8) -> Option<TypeFlag> {
        match byte {
            0 | b'0' => Some(TypeFlag::File),
            b'5' => Some(TypeFlag::Directory),
            b'L' => Some(TypeFlag::GnuLongName),
            b'x' => Some(TypeFlag::PaxExtended),
            b'g' => Some(TypeFlag::PaxGlobal),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TypeFlag::File => '0',
            TypeFlag::Directory => '5',
            TypeFlag::GnuLongName => 'L',
            TypeFlag::PaxExtended => 'x',
            TypeFlag::PaxGlobal => 'g',
        }
    }

    /// The kind of index entry this flag produces, or `None` for records that
    /// only carry metadata for later entries.
    pub fn entry_kind(self) -> Option<EntryKind> {
        match self {
            TypeFlag::File => Some(EntryKind::File),
            TypeFlag::Directory => Some(EntryKind::Directory),
            _ => None,
        }
    }
}

impl fmt::Display for TypeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.as_char())
    }
}

/// The fields of a header block that the index cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    /// The name field, with the ustar prefix joined in front when present.
    pub name: String,
    pub size: u64,
    pub type_flag: TypeFlag,
    pub ustar: bool,
}

#[inline]
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|b| *b == 0)
}

/// Sums the block with the checksum field counted as eight spaces.
pub fn checksum(block: &[u8; BLOCK_LEN]) -> u64 {
    let seed = 8 * b' ' as u64;
    block[..CHECKSUM.start]
        .iter()
        .chain(&block[CHECKSUM.end..])
        .fold(seed, |acc, b| acc + *b as u64)
}

pub fn verify_checksum(block: &[u8; BLOCK_LEN], position: u64) -> Result<(), ScanError> {
    let stored = codec::bytes_to_number(&block[CHECKSUM], 8).map_err(|_| ScanError::Corrupted {
        position,
        reason: "checksum field is not octal".into(),
    })?;
    let actual = checksum(block);

    if stored != actual {
        return Err(ScanError::Corrupted {
            position,
            reason: format!("checksum mismatch: stored {:o}, computed {:o}", stored, actual),
        });
    }

    Ok(())
}

pub fn parse_header(
    block: &[u8; BLOCK_LEN],
    position: u64,
    verify: bool,
) -> Result<RawHeader, ScanError> {
    if verify {
        verify_checksum(block, position)?;
    }

    let mut name = codec::to_readable_string(&block[NAME]);

    let mut size_field = [0u8; 12];
    size_field.copy_from_slice(&block[SIZE]);
    let size = codec::decode_size(&size_field).map_err(|e| match e {
        NumberError::Overflow => ScanError::Unsupported("archive exceeds supported size".into()),
        NumberError::InvalidDigits(_) => ScanError::Corrupted {
            position,
            reason: "size field is not octal".into(),
        },
    })?;

    let type_flag = TypeFlag::from_byte(block[TYPE_FLAG]).ok_or_else(|| {
        ScanError::Unsupported(format!(
            "entry type '{}' is not supported",
            (block[TYPE_FLAG] as char).escape_default()
        ))
    })?;

    let ustar = codec::encode_to_string(&block[MAGIC], " ") == USTAR_MAGIC;
    if ustar {
        let prefix = codec::to_readable_string(&block[PREFIX]);
        if !prefix.is_empty() {
            name = format!("{}/{}", prefix, name);
        }
    }

    Ok(RawHeader {
        name,
        size,
        type_flag,
        ustar,
    })
}

/// Parses the records of a PAX extended or global header.
///
/// Returns the value of the `path` keyword if one is present.
pub fn parse_pax_records(data: &[u8], position: u64) -> Result<Option<String>, ScanError> {
    let corrupted = |reason: &str| ScanError::Corrupted {
        position,
        reason: format!("malformed PAX record: {}", reason),
    };

    let mut path = None;
    let mut rest = data;

    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| corrupted("missing length"))?;
        let digits = &rest[..space];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(corrupted("length is not a decimal number"));
        }
        let len = codec::bytes_to_number(digits, 10).map_err(|_| corrupted("length overflows"))?;
        let len = usize::try_from(len).map_err(|_| corrupted("length overflows"))?;

        if len > rest.len() {
            return Err(corrupted("length exceeds header data"));
        }
        if len < space + 3 {
            return Err(corrupted("length too short"));
        }

        let record = &rest[..len];
        if record[len - 1] != b'\n' {
            return Err(corrupted("record is not newline terminated"));
        }

        let body = &record[space + 1..len - 1];
        let eq = body
            .iter()
            .position(|b| *b == b'=')
            .ok_or_else(|| corrupted("missing '='"))?;
        let keyword = &body[..eq];
        let value = &body[eq + 1..];

        if keyword.is_empty()
            || !keyword
                .iter()
                .all(|b| b.is_ascii_alphanumeric() || *b == b'.' || *b == b'_')
        {
            return Err(corrupted("invalid keyword"));
        }

        trace!(
            position,
            keyword = %String::from_utf8_lossy(keyword),
            len,
            "PAX record"
        );

        match keyword {
            b"path" => {
                let value = std::str::from_utf8(value)
                    .map_err(|_| corrupted("path is not valid UTF-8"))?;
                path = Some(value.to_string());
            }
            b"charset" => {
                return Err(ScanError::Unsupported(format!(
                    "PAX charset '{}' is not supported",
                    String::from_utf8_lossy(value)
                )));
            }
            _ => {}
        }

        rest = &rest[len..];
    }

    Ok(path)
}

/// Names carried over from metadata records to the entries they describe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingNames {
    /// From a GNU `L` record. Applies to the next entry only.
    pub long_name: Option<String>,
    /// From a PAX `x` record. Applies to the next entry only.
    pub pax_path: Option<String>,
    /// From a PAX `g` record. Applies until replaced.
    pub global_path: Option<String>,
}

impl PendingNames {
    pub fn set_long_name(&mut self, data: &[u8]) {
        self.long_name = Some(codec::to_readable_string(data));
    }

    /// Picks the final name for a real entry, consuming the single-entry
    /// overrides.
    pub fn resolve(&mut self, header_name: String) -> String {
        let long_name = self.long_name.take();
        let pax_path = self.pax_path.take();

        long_name
            .or(pax_path)
            .or_else(|| self.global_path.clone())
            .unwrap_or(header_name)
    }
}
