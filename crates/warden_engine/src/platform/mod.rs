//! # Client Platforms
//!
//! The handshake and check cycle are the same for every client build. What
//! differs is the module, how the hash challenge is answered and how checks
//! are laid out on the wire. A `ClientPlatform` supplies exactly that.

mod win32;

pub use win32::Win32Platform;
pub(crate) use win32::CLEAN_MARKER;

use rand::RngCore;
use warden_catalog::{CheckCatalog, CheckDefinition};
use warden_crypto::{Key, Sha1Digest};
use warden_protocol::{ModuleImage, ProtocolResult};

/// Reply to the timing check carried at the head of every result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingReply {
    /// Non-zero when the client considers its own clock sane.
    pub result: u8,
    /// Client tick counter in milliseconds.
    pub client_ticks: u32,
}

/// How a single check failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The client could not perform the read.
    Status(u8),
    /// The returned bytes differ from the stored result.
    Mismatch,
    /// The found/not-found marker has the failing value.
    Marker(u8),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {status:#04x}"),
            Self::Mismatch => f.write_str("result mismatch"),
            Self::Marker(marker) => write!(f, "marker {marker:#04x}"),
        }
    }
}

/// A failed check in a decoded result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckFailure {
    /// Id of the failed check.
    pub check_id: u16,
    /// How it failed.
    pub reason: FailureReason,
}

/// Decoded `CheatChecksResult` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultReport {
    /// Timing reply.
    pub timing: TimingReply,
    /// Checks that passed.
    pub passed: usize,
    /// Failed checks in wire order.
    pub failures: Vec<CheckFailure>,
}

/// Platform-specific side of the protocol.
pub trait ClientPlatform {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Module shipped to clients of this platform.
    fn module_image(&self) -> &ModuleImage;

    /// Digest an unmodified client returns for the hash challenge.
    fn expected_hash_reply(&self, seed: &Key) -> Sha1Digest;

    /// Blocks sent as `ModuleInitialize` once the handshake succeeds.
    fn initialization_blocks(&self) -> Vec<Vec<u8>>;

    /// Bytes of a request that carries no catalog checks.
    fn request_overhead(&self) -> usize;

    /// Bytes a check adds to a request, string table entries included.
    fn check_wire_size(&self, check: &CheckDefinition) -> usize;

    /// Serializes a `CheatChecksRequest`. `xor` obfuscates check type bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a check cannot be represented on the wire.
    fn encode_request(
        &self,
        checks: &[&CheckDefinition],
        xor: u8,
        server_ticks: u32,
        rng: &mut dyn RngCore,
    ) -> ProtocolResult<Vec<u8>>;

    /// Decodes a verified `CheatChecksResult` payload for the pending checks.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` when the payload ends before every pending check
    /// is accounted for.
    fn decode_result(
        &self,
        payload: &[u8],
        pending: &[u16],
        catalog: &CheckCatalog,
    ) -> ProtocolResult<ResultReport>;
}
