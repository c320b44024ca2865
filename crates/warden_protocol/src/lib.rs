//! # Warden Protocol
//!
//! Binary message layouts exchanged between the server engine and the
//! client-side module.
//!
//! ## Message Flow
//!
//! ```text
//! SERVER                                    CLIENT
//!   |--- ModuleCache (chunk 1..n) ----------->|
//!   |--- ModuleUse (id, key, size) ---------->|
//!   |<-- ModuleOk / ModuleMissing ------------|
//!   |--- HashRequest (seed) ----------------->|
//!   |<-- HashResult (digest) -----------------|   keys switch here
//!   |--- ModuleInitialize (blocks) ---------->|
//!   |--- CheatChecksRequest ----------------->|   every cycle
//!   |<-- CheatChecksResult (checksummed) -----|
//! ```
//!
//! Every message is wrapped in the per-direction stream cipher by the
//! caller; this crate only deals with plaintext layouts.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod frame;
pub mod messages;
pub mod module;
pub mod opcodes;
pub mod serialization;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{encode_checked, read_checked, FRAME_HEADER_SIZE};
pub use module::{ClientModule, ModuleImage, MODULE_CHUNK_SIZE};
pub use opcodes::{ClientOpcode, ServerOpcode};
pub use serialization::{PacketReader, PacketWriter};

/// Hard ceiling of a single transport message; larger messages are truncated.
pub const TRANSPORT_MESSAGE_LIMIT: usize = 512;
