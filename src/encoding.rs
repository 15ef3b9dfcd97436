//! Deterministic byte layout used for hashing and signing.
//!
//! Every consensus-relevant structure writes itself field by field through
//! [`Writer`] and reads itself back through [`Reader`]. Layouts:
//!
//! - `varint`: compact size. Values below `0xFD` take one byte, otherwise a
//!   marker (`0xFD`, `0xFE`, `0xFF`) followed by a little-endian `u16`, `u32`
//!   or `u64`.
//! - `varbytes`: `varint(len) || bytes`.
//! - `varbigint`: `varbytes` of the little-endian magnitude, with a trailing
//!   `0x00` whenever the top bit of the last byte is set. Zero is `[0x00]`.
//!
//! The reader only accepts the canonical form of each value, so decoding and
//! re-encoding always reproduces the input bytes.

use crate::error::{ChainError, Result};
use num_bigint::BigUint;

#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Writer {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_u32_le(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64_le(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_varint(&mut self, value: u64) -> &mut Self {
        if value < 0xFD {
            self.buf.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.buf.push(0xFD);
            self.buf.extend_from_slice(&(value as u16).to_le_bytes());
        } else if value <= u32::MAX as u64 {
            self.buf.push(0xFE);
            self.buf.extend_from_slice(&(value as u32).to_le_bytes());
        } else {
            self.buf.push(0xFF);
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn write_varbytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_varbigint(&mut self, value: &BigUint) -> &mut Self {
        let bytes = bigint_to_bytes(value);
        self.write_varbytes(&bytes)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Little-endian magnitude in non-negative two's-complement form.
fn bigint_to_bytes(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_le();
    if bytes.last().is_some_and(|b| b & 0x80 != 0) {
        bytes.push(0x00);
    }
    bytes
}

/// Cursor over an encoded buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails if any bytes remain unread.
    pub fn finish(&self) -> Result<()> {
        if self.is_finished() {
            Ok(())
        } else {
            Err(ChainError::Encoding(format!(
                "{} trailing bytes after value",
                self.remaining()
            )))
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(ChainError::Encoding(format!(
                "Unexpected end of input: need {} bytes at offset {}, {} available",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_hash(&mut self) -> Result<[u8; 32]> {
        self.take_array()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, min) = match self.read_u8()? {
            0xFD => (self.read_u16_le()? as u64, 0xFD),
            0xFE => (self.read_u32_le()? as u64, u16::MAX as u64 + 1),
            0xFF => (self.read_u64_le()?, u32::MAX as u64 + 1),
            small => return Ok(small as u64),
        };
        if value < min {
            return Err(ChainError::Encoding(format!(
                "Non-canonical varint encoding of {}",
                value
            )));
        }
        Ok(value)
    }

    pub fn read_varbytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| ChainError::Encoding(format!("Length {} does not fit in memory", len)))?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_varbigint(&mut self) -> Result<BigUint> {
        let bytes = self.read_varbytes()?;
        let last = *bytes
            .last()
            .ok_or_else(|| ChainError::Encoding("Empty big integer".to_string()))?;
        if last & 0x80 != 0 {
            return Err(ChainError::Encoding(
                "Negative big integer where unsigned expected".to_string(),
            ));
        }
        let value = BigUint::from_bytes_le(&bytes);
        if bigint_to_bytes(&value) != bytes {
            return Err(ChainError::Encoding(format!(
                "Non-canonical big integer encoding of {}",
                value
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_varint(value: u64) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_varint(value);
        w.into_bytes()
    }

    fn encode_bigint(value: u64) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_varbigint(&BigUint::from(value));
        w.into_bytes()
    }

    #[test]
    fn test_writer_tracks_length() {
        let mut w = Writer::new();
        assert!(w.is_empty());
        w.write_u8(1).write_u32_le(2).write_varbytes(b"abc");
        assert_eq!(w.len(), 1 + 4 + 1 + 3);
        assert!(!w.is_empty());
    }

    #[test]
    fn test_varint_boundaries() {
        assert_eq!(encode_varint(0xFC), vec![0xFC]);
        assert_eq!(encode_varint(0xFD), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(encode_varint(0x1_0000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encode_varint(u64::MAX)[0], 0xFF);
        assert_eq!(encode_varint(u64::MAX).len(), 9);
    }

    #[test]
    fn test_bigint_layout() {
        assert_eq!(encode_bigint(0), vec![0x01, 0x00]);
        assert_eq!(encode_bigint(0x7F), vec![0x01, 0x7F]);
        // high bit set gains a sign byte
        assert_eq!(encode_bigint(0x80), vec![0x02, 0x80, 0x00]);
        assert_eq!(encode_bigint(0x0102), vec![0x02, 0x02, 0x01]);
    }

    #[test]
    fn test_reader_rejects_non_canonical_varint() {
        let mut reader = Reader::new(&[0xFD, 0x05, 0x00]);
        assert!(reader.read_varint().is_err());
    }

    #[test]
    fn test_reader_rejects_non_canonical_bigint() {
        // 5 padded with a redundant zero byte
        let mut reader = Reader::new(&[0x02, 0x05, 0x00]);
        assert!(reader.read_varbigint().is_err());

        let mut reader = Reader::new(&[0x01, 0x80]);
        assert!(reader
            .read_varbigint()
            .unwrap_err()
            .to_string()
            .contains("Negative"));
    }

    #[test]
    fn test_reader_truncated_input() {
        let mut reader = Reader::new(&[0x05, 0x01, 0x02]);
        let err = reader.read_varbytes().unwrap_err();
        assert!(err.to_string().contains("Unexpected end of input"));
    }

    #[test]
    fn test_mixed_fields_read_back() {
        let big = BigUint::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let mut w = Writer::new();
        w.write_varbytes(b"script")
            .write_varbigint(&big)
            .write_u32_le(7)
            .write_u64_le(99);
        let bytes = w.into_bytes();

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_varbytes().unwrap(), b"script".to_vec());
        assert_eq!(reader.read_varbigint().unwrap(), big);
        assert_eq!(reader.read_u32_le().unwrap(), 7);
        assert_eq!(reader.read_u64_le().unwrap(), 99);
        assert!(reader.finish().is_ok());
    }
}
