//! # Engine Error Types
//!
//! Only setup can fail. Once an engine exists, everything the peer does
//! wrong is turned into a penalty instead of an error.

use thiserror::Error;
use warden_catalog::CatalogError;
use warden_protocol::ProtocolError;

use crate::config::ConfigError;

/// Errors raised while setting up engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or is out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The check catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A platform message could not be encoded.
    #[error("platform message: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Result type for engine setup.
pub type EngineResult<T> = Result<T, EngineError>;
