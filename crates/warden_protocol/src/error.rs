//! # Protocol Error Types
//!
//! Everything that can be wrong with a message the peer sent.

use thiserror::Error;

/// Errors produced while decoding or packaging protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message ended before a field could be read.
    #[error("truncated message: needed {needed} more bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the field required.
        needed: usize,
        /// Bytes left in the message.
        remaining: usize,
    },

    /// A framed message declared a different payload size than it carried.
    #[error("frame length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Length written in the frame header.
        declared: usize,
        /// Bytes actually following the header.
        actual: usize,
    },

    /// The frame checksum does not match its payload.
    #[error("frame checksum mismatch: declared {declared:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum written in the frame header.
        declared: u32,
        /// Checksum computed over the payload.
        computed: u32,
    },

    /// An opcode byte that does not name any message.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// A check type byte that does not name any check kind.
    #[error("unknown check type {0:#04x}")]
    UnknownCheckType(u8),

    /// A length-prefixed field is longer than its prefix can express.
    #[error("field too long: {len} bytes, limit {limit}")]
    FieldTooLong {
        /// Length of the field.
        len: usize,
        /// Largest encodable length.
        limit: usize,
    },

    /// The module payload could not be unpacked.
    #[error("module payload corrupt: {0}")]
    CorruptModule(String),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
