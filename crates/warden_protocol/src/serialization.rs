//! # Packet Serialization
//!
//! Little-endian writer and bounds-checked reader for protocol messages.
//!
//! ## Design
//!
//! - The writer grows a `Vec` and never fails on plain integers; only
//!   length-prefixed fields can be rejected
//! - The reader borrows the received buffer and reports exactly how many
//!   bytes were missing when a field runs past the end

use crate::error::{ProtocolError, ProtocolResult};

/// Packet writer.
#[derive(Clone, Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes raw bytes with no length prefix.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Writes bytes prefixed with a one-byte length.
    ///
    /// # Errors
    ///
    /// Returns `FieldTooLong` if `bytes` is longer than 255.
    pub fn write_short_bytes(&mut self, bytes: &[u8]) -> ProtocolResult<&mut Self> {
        let len = u8::try_from(bytes.len()).map_err(|_| ProtocolError::FieldTooLong {
            len: bytes.len(),
            limit: usize::from(u8::MAX),
        })?;
        self.write_u8(len);
        Ok(self.write_bytes(bytes))
    }
}

/// Packet reader over a received buffer.
#[derive(Clone, Debug)]
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns the current read position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the unread part of the buffer without consuming it.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.position.min(self.buffer.len())..]
    }

    /// Reads `count` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than `count` bytes remain.
    pub fn read_bytes(&mut self, count: usize) -> ProtocolResult<&'a [u8]> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(ProtocolError::Truncated {
                needed: count,
                remaining,
            });
        }
        let bytes = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Reads a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> ProtocolResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at the end of the buffer.
    #[inline]
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a u16 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than 2 bytes remain.
    #[inline]
    pub fn read_u16(&mut self) -> ProtocolResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Reads a u32 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> ProtocolResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads bytes prefixed with a one-byte length.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if the prefix or the body runs past the end.
    pub fn read_short_bytes(&mut self) -> ProtocolResult<&'a [u8]> {
        let len = self.read_u8()?;
        self.read_bytes(usize::from(len))
    }

    /// Skips `count` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than `count` bytes remain.
    pub fn skip(&mut self, count: usize) -> ProtocolResult<()> {
        self.read_bytes(count).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_mixed_fields() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0x02).write_u16(0xBEEF).write_u32(0xDEAD_BEEF);
        writer.write_short_bytes(b"KERNEL32.DLL").unwrap();

        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 1 + 2 + 4 + 1 + 12);
        assert_eq!(&bytes[1..3], &[0xEF, 0xBE]);

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_short_bytes().unwrap(), b"KERNEL32.DLL");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_read_reports_shortfall() {
        let bytes = [0x01, 0x02, 0x03];
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(
            reader.read_u32(),
            Err(ProtocolError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
        // A failed read consumes nothing
        assert_eq!(reader.remaining(), 3);
    }

    #[test]
    fn test_short_bytes_length_beyond_buffer() {
        // Claims 200 bytes, carries 2
        let bytes = [200u8, 0xAA, 0xBB];
        let mut reader = PacketReader::new(&bytes);
        assert!(matches!(
            reader.read_short_bytes(),
            Err(ProtocolError::Truncated { needed: 200, .. })
        ));
    }

    #[test]
    fn test_short_bytes_rejects_oversized_field() {
        let mut writer = PacketWriter::new();
        let long = vec![b'x'; 256];
        assert_eq!(
            writer.write_short_bytes(&long).unwrap_err(),
            ProtocolError::FieldTooLong { len: 256, limit: 255 }
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn test_rest_does_not_consume() {
        let bytes = [1u8, 2, 3, 4];
        let mut reader = PacketReader::new(&bytes);
        reader.skip(1).unwrap();
        assert_eq!(reader.rest(), &[2, 3, 4]);
        assert_eq!(reader.position(), 1);
    }
}
