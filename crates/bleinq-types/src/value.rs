//! Raw characteristic values read over GATT.

use std::fmt;

use bytes::Buf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Bytes read from a GATT characteristic.
///
/// Accessors are bounds-checked and return [`ParseError::MalformedPayload`]
/// instead of panicking on short values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharacteristicValue(Vec<u8>);

impl CharacteristicValue {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn tail(&self, offset: usize, needed: usize, field: &'static str) -> ParseResult<&[u8]> {
        let available = self.0.len().saturating_sub(offset);
        if available < needed {
            return Err(ParseError::malformed(field, needed, available));
        }
        Ok(&self.0[offset..])
    }

    /// Unsigned byte at `offset` (e.g. a battery percentage).
    pub fn uint8(&self, offset: usize) -> ParseResult<u8> {
        let mut buf = self.tail(offset, 1, "uint8")?;
        Ok(buf.get_u8())
    }

    /// Little-endian unsigned 16-bit value at `offset`.
    pub fn uint16_le(&self, offset: usize) -> ParseResult<u16> {
        let mut buf = self.tail(offset, 2, "uint16")?;
        Ok(buf.get_u16_le())
    }

    /// Little-endian signed 16-bit value at `offset`.
    pub fn sint16_le(&self, offset: usize) -> ParseResult<i16> {
        let mut buf = self.tail(offset, 2, "sint16")?;
        Ok(buf.get_i16_le())
    }

    /// Lowercase hex without separators.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Value interpreted as UTF-8 text, if valid.
    pub fn as_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<Vec<u8>> for CharacteristicValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for CharacteristicValue {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Parse a hex string into bytes.
///
/// Whitespace, `:` and `-` separators are ignored, as is a leading `0x`.
///
/// ```
/// use bleinq_types::value::parse_hex;
///
/// assert_eq!(parse_hex("0a 10 01 5d").unwrap(), vec![0x0a, 0x10, 0x01, 0x5d]);
/// assert_eq!(parse_hex("0x0a:ff").unwrap(), vec![0x0a, 0xff]);
/// ```
pub fn parse_hex(input: &str) -> ParseResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(ParseError::InvalidData(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_digit(pair[0])?;
            let lo = hex_digit(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_digit(c: u8) -> ParseResult<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ParseError::InvalidData(format!(
            "invalid hex digit '{}'",
            c as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint8_at_offset_zero() {
        let value = CharacteristicValue::new(vec![93]);
        assert_eq!(value.uint8(0), Ok(93));
    }

    #[test]
    fn test_uint8_on_empty_value_is_malformed() {
        let value = CharacteristicValue::default();
        assert!(matches!(
            value.uint8(0),
            Err(ParseError::MalformedPayload {
                needed: 1,
                available: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_sixteen_bit_accessors() {
        let value = CharacteristicValue::new(vec![0x00, 0xe8, 0x00, 0xda, 0xff]);
        assert_eq!(value.uint16_le(1), Ok(232));
        assert_eq!(value.sint16_le(3), Ok(-38));
        assert!(value.uint16_le(4).is_err());
        assert!(value.sint16_le(10).is_err());
    }

    #[test]
    fn test_hex_rendering() {
        let value = CharacteristicValue::from(&[0x0a_u8, 0xff, 0x00][..]);
        assert_eq!(value.to_hex(), "0aff00");
        assert_eq!(value.to_string(), "0aff00");
    }

    #[test]
    fn test_utf8() {
        let value = CharacteristicValue::from(b"LYWSD03MMC".to_vec());
        assert_eq!(value.as_utf8(), Some("LYWSD03MMC"));
        assert_eq!(CharacteristicValue::new(vec![0xff]).as_utf8(), None);
    }

    #[test]
    fn test_parse_hex_variants() {
        assert_eq!(parse_hex("50 20 aa 01").unwrap(), vec![0x50, 0x20, 0xaa, 0x01]);
        assert_eq!(parse_hex("5020AA01").unwrap(), vec![0x50, 0x20, 0xaa, 0x01]);
        assert_eq!(parse_hex("58-2d").unwrap(), vec![0x58, 0x2d]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_hex_errors() {
        assert!(matches!(parse_hex("abc"), Err(ParseError::InvalidData(_))));
        assert!(matches!(parse_hex("zz"), Err(ParseError::InvalidData(_))));
    }
}
