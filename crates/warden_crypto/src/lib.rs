//! # Warden Crypto
//!
//! Primitives shared by both ends of the Warden protocol.
//!
//! ## Contents
//!
//! - **`KeyStream`**: Deterministic byte stream seeded from a secret. Used to
//!   derive session keys, the handshake seed and module identifiers.
//! - **`StreamCipher`**: RC4 state. Every protocol message in either direction
//!   passes through one of two per-connection instances.
//! - **Checksums**: SHA-1 folded to 32 bits, HMAC-SHA1, constant-time compare.
//!
//! ## Key Schedule
//!
//! ```text
//! shared secret ──► KeyStream ──► InputKey (16) ──► inbound StreamCipher
//!                             ├─► OutputKey (16) ─► outbound StreamCipher
//!                             └─► Seed (16) ──────► hash challenge
//! ```
//!
//! Nothing here is suitable as a general purpose RNG or as modern
//! confidentiality. The client dictates the algorithms.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod checksum;
pub mod cipher;
pub mod keystream;

pub use checksum::{constant_time_eq, fold_checksum, hmac_sha1, sha1_digest, Sha1Digest, DIGEST_LEN};
pub use cipher::StreamCipher;
pub use keystream::KeyStream;

/// Length of every symmetric key and of the handshake seed.
pub const KEY_LEN: usize = 16;

/// A symmetric key or seed buffer.
pub type Key = [u8; KEY_LEN];
