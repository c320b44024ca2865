//! # Client Module Packaging
//!
//! The module is the compiled probe the client executes. The server never
//! interprets it; it only packages and ships it.
//!
//! ## Packaging
//!
//! ```text
//! code ──► lz4 (size prepended) ──► RC4(key) ──► payload
//!
//! id, key = KeyStream(sha1(code)).next(16), .next(16)
//! ```
//!
//! Identical code always produces the same id, so a client that already
//! cached the module can answer `ModuleOk` without a transfer.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use warden_crypto::{sha1_digest, Key, KeyStream, StreamCipher};

use crate::error::{ProtocolError, ProtocolResult};
use crate::opcodes::ServerOpcode;
use crate::serialization::PacketWriter;

/// Largest payload slice carried by one `ModuleCache` message.
pub const MODULE_CHUNK_SIZE: usize = 500;

/// What a platform supplies: the probe code and the keys the module
/// switches to once it is running.
#[derive(Clone)]
pub struct ModuleImage {
    /// Opaque compiled probe.
    pub code: Vec<u8>,
    /// Key the client encrypts with after the handshake.
    pub client_key_seed: Key,
    /// Key the server encrypts with after the handshake.
    pub server_key_seed: Key,
}

impl ModuleImage {
    /// Creates a module image.
    #[must_use]
    pub fn new(code: Vec<u8>, client_key_seed: Key, server_key_seed: Key) -> Self {
        Self {
            code,
            client_key_seed,
            server_key_seed,
        }
    }
}

impl std::fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleImage")
            .field("code_len", &self.code.len())
            .field("key_seeds", &"[REDACTED]")
            .finish()
    }
}

/// A packaged module ready for transfer.
#[derive(Clone)]
pub struct ClientModule {
    /// Identifier the client caches the module under.
    pub id: Key,
    /// RC4 key the payload is encrypted with.
    pub key: Key,
    /// Compressed, encrypted payload.
    pub payload: Vec<u8>,
}

impl ClientModule {
    /// Packages a module image.
    #[must_use]
    pub fn build(image: &ModuleImage) -> Self {
        let mut ids = KeyStream::new(&sha1_digest(&image.code));
        let id: Key = ids.next_array();
        let key: Key = ids.next_array();

        let mut payload = compress_prepend_size(&image.code);
        StreamCipher::new(&key).process(&mut payload);

        Self { id, key, payload }
    }

    /// Returns the size of the compressed payload.
    #[must_use]
    pub fn compressed_size(&self) -> usize {
        self.payload.len()
    }

    /// Builds the `ModuleCache` messages carrying the payload in order.
    #[must_use]
    pub fn cache_messages(&self) -> Vec<Vec<u8>> {
        self.payload
            .chunks(MODULE_CHUNK_SIZE)
            .map(|chunk| {
                // chunks() bounds every slice by MODULE_CHUNK_SIZE
                let len = u16::try_from(chunk.len()).unwrap_or(u16::MAX);
                let mut writer = PacketWriter::with_capacity(3 + chunk.len());
                writer
                    .write_u8(ServerOpcode::ModuleCache as u8)
                    .write_u16(len)
                    .write_bytes(chunk);
                writer.into_bytes()
            })
            .collect()
    }

    /// Builds the `ModuleUse` message announcing id, key and size.
    #[must_use]
    pub fn use_message(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(1 + 16 + 16 + 4);
        writer
            .write_u8(ServerOpcode::ModuleUse as u8)
            .write_bytes(&self.id)
            .write_bytes(&self.key)
            .write_u32(u32::try_from(self.payload.len()).unwrap_or(u32::MAX));
        writer.into_bytes()
    }

    /// Decrypts and decompresses a received payload, as the client does.
    ///
    /// # Errors
    ///
    /// Returns `CorruptModule` if the payload does not decompress.
    pub fn unpack(key: &Key, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        let mut plain = payload.to_vec();
        StreamCipher::new(key).process(&mut plain);
        decompress_size_prepended(&plain).map_err(|e| ProtocolError::CorruptModule(e.to_string()))
    }
}

impl std::fmt::Debug for ClientModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientModule")
            .field("id", &self.id)
            .field("compressed_size", &self.payload.len())
            .finish_non_exhaustive()
    }
}
