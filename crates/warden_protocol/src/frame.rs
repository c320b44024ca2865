//! # Checksummed Frames
//!
//! Messages whose payload integrity matters carry a length and a folded
//! SHA-1 checksum:
//!
//! ```text
//! ┌────────┬──────────┬──────────────┬─────────────────────┐
//! │ op (1) │ len (2)  │ checksum (4) │ payload (len bytes) │
//! └────────┴──────────┴──────────────┴─────────────────────┘
//! ```
//!
//! The check-result frame is the one the client can tamper with; a wrong
//! length or checksum means the payload was forged or mangled.

use warden_crypto::fold_checksum;

use crate::error::{ProtocolError, ProtocolResult};
use crate::serialization::{PacketReader, PacketWriter};

/// Bytes between the opcode and the payload.
pub const FRAME_HEADER_SIZE: usize = 2 + 4;

/// Builds a checksummed frame.
///
/// # Errors
///
/// Returns `FieldTooLong` if the payload does not fit a u16 length.
pub fn encode_checked(opcode: u8, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    let len = u16::try_from(payload.len()).map_err(|_| ProtocolError::FieldTooLong {
        len: payload.len(),
        limit: usize::from(u16::MAX),
    })?;

    let mut writer = PacketWriter::with_capacity(1 + FRAME_HEADER_SIZE + payload.len());
    writer
        .write_u8(opcode)
        .write_u16(len)
        .write_u32(fold_checksum(payload))
        .write_bytes(payload);
    Ok(writer.into_bytes())
}

/// Reads the frame header following an already consumed opcode and returns
/// the verified payload.
///
/// The declared length must match the remaining bytes exactly.
///
/// # Errors
///
/// - `Truncated` if the header itself is incomplete
/// - `LengthMismatch` if the declared length disagrees with the buffer
/// - `ChecksumMismatch` if the payload does not hash to the declared value
pub fn read_checked<'a>(reader: &mut PacketReader<'a>) -> ProtocolResult<&'a [u8]> {
    let declared_len = usize::from(reader.read_u16()?);
    let declared_checksum = reader.read_u32()?;

    if declared_len != reader.remaining() {
        return Err(ProtocolError::LengthMismatch {
            declared: declared_len,
            actual: reader.remaining(),
        });
    }

    let payload = reader.read_bytes(declared_len)?;
    let computed = fold_checksum(payload);
    if computed != declared_checksum {
        return Err(ProtocolError::ChecksumMismatch {
            declared: declared_checksum,
            computed,
        });
    }

    Ok(payload)
}
