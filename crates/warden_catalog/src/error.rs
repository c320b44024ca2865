//! # Catalog Error Types
//!
//! `RowError` rejects a single row and never aborts a load.
//! `CatalogError` is what actually stops one.

use std::path::PathBuf;

use thiserror::Error;

use crate::kind::CheckKind;

/// Why a single check row was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The stored type byte names no check kind.
    #[error("unsupported check type {0:#04x}")]
    UnsupportedKind(u8),

    /// The kind exists but is never scheduled from the catalog.
    #[error("check kind {0} has no category")]
    Uncategorized(CheckKind),

    /// The id does not fit the 16-bit id space.
    #[error("check id {0} out of range")]
    IdOutOfRange(u32),

    /// Lua ids travel as four decimal digits.
    #[error("Lua check id {0} exceeds the four-digit limit")]
    LuaIdOutOfRange(u32),

    /// The Lua body does not fit the client script length limit.
    #[error("Lua check body is {len} bytes, limit {limit}")]
    LuaScriptTooLong {
        /// Length of the stored body.
        len: usize,
        /// Longest body accepted.
        limit: usize,
    },

    /// The kind compares against a stored result but none is present.
    #[error("{0} check has no stored result")]
    MissingResult(CheckKind),

    /// The stored result has the wrong size for its kind.
    #[error("stored result is {actual} bytes, expected {expected}")]
    ResultLengthMismatch {
        /// Size the kind requires.
        expected: usize,
        /// Size stored.
        actual: usize,
    },

    /// The kind carries a fixed-size data blob that is missing or malformed.
    #[error("{kind} check data is {actual} bytes, expected {expected}")]
    MissingData {
        /// Kind of the row.
        kind: CheckKind,
        /// Size the kind requires.
        expected: usize,
        /// Size stored.
        actual: usize,
    },

    /// The kind references a string (module, file, script) but none is present.
    #[error("{0} check has no string")]
    MissingString(CheckKind),

    /// A hex field could not be decoded.
    #[error("invalid hex in `{field}`: {reason}")]
    InvalidHex {
        /// Name of the field.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },
}

/// Errors that abort loading the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Two rows share an id; overrides keyed by id would be ambiguous.
    #[error("duplicate check id {0}")]
    DuplicateCheckId(u16),

    /// The store could not be read.
    #[error("failed to read check store {path}: {source}")]
    Io {
        /// Path of the store.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The store is not valid TOML or does not match the row schema.
    #[error("invalid check store: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
