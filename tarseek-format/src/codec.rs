//! Decoding of the fixed-width byte fields found in archive headers.

use byteorder::{BigEndian, ByteOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("Field contains a character that is not a base-{0} digit")]
    InvalidDigits(u32),

    #[error("Field value does not fit in 64 bits")]
    Overflow,
}

/// Cuts `field` at its first NUL byte.
#[inline]
pub fn nul_terminated(field: &[u8]) -> &[u8] {
    match field.iter().position(|b| *b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}

/// Text view of a NUL-terminated field. Invalid UTF-8 is replaced.
pub fn to_readable_string(field: &[u8]) -> String {
    String::from_utf8_lossy(nul_terminated(field)).into_owned()
}

/// Decodes an ASCII number in the given radix.
///
/// The field is cut at the first NUL and surrounding spaces are ignored. An
/// empty field decodes as zero.
pub fn bytes_to_number(field: &[u8], radix: u32) -> Result<u64, NumberError> {
    let field = nul_terminated(field);
    let digits = trim_spaces(field);

    let mut value: u64 = 0;
    for byte in digits {
        let digit = (*byte as char)
            .to_digit(radix)
            .ok_or(NumberError::InvalidDigits(radix))?;
        value = value
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or(NumberError::Overflow)?;
    }

    Ok(value)
}

fn trim_spaces(mut field: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = field {
        if first.is_ascii_whitespace() {
            field = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = field {
        if last.is_ascii_whitespace() {
            field = rest;
        } else {
            break;
        }
    }
    field
}

/// Decodes the 12-byte tar size field.
///
/// With the high bit of the first byte clear the field holds octal digits.
/// With it set the remaining 95 bits are a big-endian binary number.
pub fn decode_size(field: &[u8; 12]) -> Result<u64, NumberError> {
    if field[0] & 0x80 == 0 {
        return bytes_to_number(field, 8);
    }

    let mut buf = [0u8; 16];
    buf[4..].copy_from_slice(field);
    buf[4] &= 0x7f;

    u64::try_from(BigEndian::read_u128(&buf)).map_err(|_| NumberError::Overflow)
}

/// Renders bytes as uppercase hex pairs joined by `delimiter`.
pub fn encode_to_string(bytes: &[u8], delimiter: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(delimiter)
}
