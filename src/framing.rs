//! Binary framing for the single string held in the backing file.
//!
//! The layout is the one a .NET binary object formatter produces for a lone
//! string, which keeps existing save files readable:
//!
//! ```text
//! 0x00  root id (i32 = 1)  header id (i32 = -1)  major (i32 = 1)  minor (i32 = 0)
//! 0x06  object id (i32 = 1)  7-bit length  utf-8 bytes
//! 0x0B
//! ```
//!
//! All integers are little-endian.

use thiserror::Error;

const RECORD_HEADER: u8 = 0x00;
const RECORD_STRING: u8 = 0x06;
const RECORD_END: u8 = 0x0B;

const ROOT_ID: i32 = 1;
const HEADER_ID: i32 = -1;
const MAJOR_VERSION: i32 = 1;
const MINOR_VERSION: i32 = 0;
const OBJECT_ID: i32 = 1;

/// A 32-bit length never needs more than five 7-bit groups.
const MAX_LENGTH_BYTES: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated at byte {0}")]
    Truncated(usize),
    #[error("frame header mismatch: {0}")]
    BadHeader(String),
    #[error("unexpected record type 0x{found:02x} at byte {offset}")]
    UnexpectedRecord { found: u8, offset: usize },
    #[error("string length prefix is malformed")]
    LengthOverflow,
    #[error("framed string is not utf-8")]
    Utf8,
    #[error("{0} trailing bytes after end record")]
    TrailingBytes(usize),
}

/// Wraps `value` in the header, string, and end records.
pub fn encode(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + 32);

    out.push(RECORD_HEADER);
    for field in [ROOT_ID, HEADER_ID, MAJOR_VERSION, MINOR_VERSION] {
        out.extend_from_slice(&field.to_le_bytes());
    }

    out.push(RECORD_STRING);
    out.extend_from_slice(&OBJECT_ID.to_le_bytes());
    write_length(&mut out, bytes.len());
    out.extend_from_slice(bytes);

    out.push(RECORD_END);
    out
}

/// Extracts the string from a framed buffer.
pub fn decode(input: &[u8]) -> Result<String, FrameError> {
    let mut reader = FrameReader::new(input);

    reader.expect_record(RECORD_HEADER)?;
    let root_id = reader.read_i32()?;
    let header_id = reader.read_i32()?;
    let major = reader.read_i32()?;
    let minor = reader.read_i32()?;
    if header_id != HEADER_ID || major != MAJOR_VERSION || minor != MINOR_VERSION {
        return Err(FrameError::BadHeader(format!(
            "header id {header_id}, version {major}.{minor}"
        )));
    }

    reader.expect_record(RECORD_STRING)?;
    let object_id = reader.read_i32()?;
    if object_id != root_id {
        return Err(FrameError::BadHeader(format!(
            "string object {object_id} is not the root object {root_id}"
        )));
    }
    let len = reader.read_length()?;
    let raw = reader.take(len)?;
    let value = String::from_utf8(raw.to_vec()).map_err(|_| FrameError::Utf8)?;

    reader.expect_record(RECORD_END)?;
    if reader.remaining() > 0 {
        return Err(FrameError::TrailingBytes(reader.remaining()));
    }
    Ok(value)
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    let mut value = len;
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

struct FrameReader<'a> {
    input: &'a [u8],
    index: usize,
}

impl<'a> FrameReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, index: 0 }
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.index
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], FrameError> {
        if self.remaining() < count {
            return Err(FrameError::Truncated(self.input.len()));
        }
        let slice = &self.input[self.index..self.index + count];
        self.index += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, FrameError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(buf))
    }

    fn expect_record(&mut self, expected: u8) -> Result<(), FrameError> {
        let offset = self.index;
        let found = self.read_u8()?;
        if found == expected {
            Ok(())
        } else {
            Err(FrameError::UnexpectedRecord { found, offset })
        }
    }

    fn read_length(&mut self) -> Result<usize, FrameError> {
        let mut value: u32 = 0;
        for group in 0..MAX_LENGTH_BYTES {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7F);
            if group == MAX_LENGTH_BYTES - 1 && bits > 0x0F {
                return Err(FrameError::LengthOverflow);
            }
            value |= bits << (7 * group);
            if byte & 0x80 == 0 {
                return usize::try_from(value).map_err(|_| FrameError::LengthOverflow);
            }
        }
        Err(FrameError::LengthOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::ToHex;

    #[test]
    fn encodes_known_layout() {
        let framed = encode("ab");
        assert_eq!(
            framed.encode_hex::<String>(),
            "0001000000ffffffff010000000000000006010000000261620b"
        );
        assert_eq!(decode(&framed).expect("decode"), "ab");
    }

    #[test]
    fn uses_multi_byte_length_prefix() {
        let text = "x".repeat(200);
        let framed = encode(&text);
        assert_eq!(&framed[22..24], &[0xC8, 0x01]);
        assert_eq!(decode(&framed).expect("decode"), text);
    }

    #[test]
    fn frames_empty_string() {
        let framed = encode("");
        assert_eq!(framed.len(), 24);
        assert_eq!(decode(&framed).expect("decode"), "");
    }

    #[test]
    fn keeps_non_ascii_text() {
        let framed = encode("épée ✓");
        assert_eq!(decode(&framed).expect("decode"), "épée ✓");
    }

    #[test]
    fn rejects_truncated_input() {
        let framed = encode("hello");
        let err = decode(&framed[..framed.len() - 3]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated(_)));
        assert!(matches!(decode(&[]), Err(FrameError::Truncated(0))));
    }

    #[test]
    fn rejects_wrong_record_type() {
        let mut framed = encode("hello");
        framed[17] = 0x07;
        assert_eq!(
            decode(&framed).unwrap_err(),
            FrameError::UnexpectedRecord {
                found: 0x07,
                offset: 17
            }
        );
    }

    #[test]
    fn rejects_foreign_header() {
        let mut framed = encode("hello");
        framed[5] = 0x00;
        assert!(matches!(decode(&framed), Err(FrameError::BadHeader(_))));
    }

    #[test]
    fn rejects_overlong_length() {
        let mut framed = encode("")[..22].to_vec();
        framed.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert_eq!(decode(&framed).unwrap_err(), FrameError::LengthOverflow);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut framed = encode("ab");
        framed[23] = 0xFF;
        assert_eq!(decode(&framed).unwrap_err(), FrameError::Utf8);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut framed = encode("ab");
        framed.push(0x00);
        assert_eq!(decode(&framed).unwrap_err(), FrameError::TrailingBytes(1));
    }
}
