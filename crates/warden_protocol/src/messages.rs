//! # Fixed-Layout Messages
//!
//! Builders for the handshake messages that have no variable structure.

use warden_crypto::{Key, Sha1Digest};

use crate::error::ProtocolResult;
use crate::frame::encode_checked;
use crate::opcodes::{ClientOpcode, ServerOpcode};
use crate::serialization::PacketWriter;

/// `HashRequest`: `[5][seed:16]`.
#[must_use]
pub fn hash_request(seed: &Key) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(1 + seed.len());
    writer.write_u8(ServerOpcode::HashRequest as u8).write_bytes(seed);
    writer.into_bytes()
}

/// `ModuleInitialize`: one checksummed frame per initialization block.
///
/// # Errors
///
/// Returns `FieldTooLong` if a block exceeds the frame length limit.
pub fn module_initialize(block: &[u8]) -> ProtocolResult<Vec<u8>> {
    encode_checked(ServerOpcode::ModuleInitialize as u8, block)
}

/// `HashResult`: `[4][digest:20]`.
#[must_use]
pub fn hash_result(digest: &Sha1Digest) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(1 + digest.len());
    writer.write_u8(ClientOpcode::HashResult as u8).write_bytes(digest);
    writer.into_bytes()
}

/// A bare client opcode with no body (`ModuleOk`, `ModuleMissing`, ...).
#[must_use]
pub fn client_signal(opcode: ClientOpcode) -> Vec<u8> {
    vec![opcode as u8]
}
