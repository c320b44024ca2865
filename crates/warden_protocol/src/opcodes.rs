//! # Opcodes
//!
//! First byte of every plaintext message. The two directions use separate
//! numbering.

use crate::error::{ProtocolError, ProtocolResult};

/// Server -> Client message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerOpcode {
    /// Announce the module (id, key, size) and ask the client to load it.
    ModuleUse = 0,
    /// One chunk of the encrypted module payload.
    ModuleCache = 1,
    /// A batch of integrity checks.
    CheatChecksRequest = 2,
    /// Function table the module needs after loading.
    ModuleInitialize = 3,
    /// Hash challenge carrying the handshake seed.
    HashRequest = 5,
}

impl ServerOpcode {
    /// Decodes an opcode byte.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOpcode` for bytes that name no server message.
    pub fn from_u8(value: u8) -> ProtocolResult<Self> {
        match value {
            0 => Ok(Self::ModuleUse),
            1 => Ok(Self::ModuleCache),
            2 => Ok(Self::CheatChecksRequest),
            3 => Ok(Self::ModuleInitialize),
            5 => Ok(Self::HashRequest),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// Client -> Server message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientOpcode {
    /// The client has no cached copy of the announced module.
    ModuleMissing = 0,
    /// The client loaded the announced module.
    ModuleOk = 1,
    /// Results of the last check batch.
    CheatChecksResult = 2,
    /// Reply to the hash challenge.
    HashResult = 4,
    /// The client failed to load the module.
    ModuleFailed = 5,
}

impl ClientOpcode {
    /// Decodes an opcode byte.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOpcode` for bytes that name no client message.
    pub fn from_u8(value: u8) -> ProtocolResult<Self> {
        match value {
            0 => Ok(Self::ModuleMissing),
            1 => Ok(Self::ModuleOk),
            2 => Ok(Self::CheatChecksResult),
            4 => Ok(Self::HashResult),
            5 => Ok(Self::ModuleFailed),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}
