//! # Collaborator Traits
//!
//! The engine owns no socket and no account database. The connection that
//! hosts it implements these.
//!
//! ```text
//! IntegrityEngine ──send()──────────► Transport      (connection writer)
//!                 ──kick()/ban()────► SessionControl (world / account service)
//! ```

use std::time::Duration;

/// Outbound half of the connection.
pub trait Transport {
    /// Queues an already encrypted message for the client.
    fn send(&mut self, packet: Vec<u8>);

    /// Secret both ends derived during authentication. Session keys and the
    /// handshake seed are drawn from it.
    fn shared_secret(&self) -> &[u8];
}

/// Session and account side effects of penalties.
pub trait SessionControl {
    /// Session the engine runs for.
    fn session_id(&self) -> u64;

    /// Account logged in on the session.
    fn account_id(&self) -> u32;

    /// Disconnects a session.
    fn kick(&mut self, session_id: u64, reason: &str);

    /// Bans an account.
    fn ban_account(&mut self, account_id: u32, duration: Duration, reason: &str);
}
