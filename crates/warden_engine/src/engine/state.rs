//! Connection state tracked by the engine.

use std::time::Instant;

/// Progress of the module handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeState {
    /// Module announced, waiting for `ModuleOk` / `ModuleMissing`.
    AwaitingModuleAck = 0,
    /// Hash challenge sent, waiting for `HashResult`.
    AwaitingHashReply = 1,
    /// Module running, check cycles in progress.
    Active = 2,
}

/// Whether the engine still processes input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Processing input and timers.
    Running,
    /// Stopped after a failed handshake; the session was left to the
    /// configured action.
    Halted,
    /// The session was terminated or the owner closed the engine.
    Closed,
}

/// The request awaiting its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// Ids of the catalog checks sent, in wire order.
    pub check_ids: Vec<u16>,
    /// Server timestamp carried by the request.
    pub server_ticks: u32,
    /// When the request was sent.
    pub sent_at: Instant,
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Requests sent.
    pub requests_sent: u64,
    /// Results that decoded without failures.
    pub clean_results: u64,
    /// Individual checks that failed.
    pub failed_checks: u64,
    /// Protocol violations.
    pub violations: u64,
    /// Lua reports received.
    pub lua_reports: u64,
}

/// Tick counter sample pair for drift detection.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimingSample {
    pub server_ticks: u32,
    pub client_ticks: u32,
}

impl TimingSample {
    /// Difference between how far each clock advanced since `earlier`.
    pub fn drift_since(self, earlier: Self) -> u32 {
        let server = self.server_ticks.wrapping_sub(earlier.server_ticks);
        let client = self.client_ticks.wrapping_sub(earlier.client_ticks);
        server.abs_diff(client)
    }
}
