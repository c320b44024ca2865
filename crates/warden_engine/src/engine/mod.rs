//! # Integrity Engine
//!
//! One engine per connection. It ships the module, runs the hash challenge
//! and then sends a batch of checks every cycle, judging each result.
//!
//! ## State Machine
//!
//! ```text
//!              ModuleMissing (resend)
//!                 ┌──────┐
//!                 ▼      │
//! new() ──► AwaitingModuleAck ──ModuleOk──► AwaitingHashReply ──HashResult ok──► Active
//!                                                   │                            │  ▲
//!                                          mismatch ▼                  deadline  ▼  │ result
//!                                                Halted                     request ─┘
//! ```
//!
//! ## Driving
//!
//! The owner calls [`IntegrityEngine::on_bytes`] for every message from the
//! client and [`IntegrityEngine::update`] from its tick. Neither blocks;
//! deadlines are compared against the `now` passed in.

mod state;

pub use state::{EngineStats, HandshakeState, Lifecycle, PendingRequest};

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, error, info, trace, warn};
use warden_catalog::{Action, Category, CheckCatalog, CheckDefinition, CheckKind, LUA_REPORT_TOKEN};
use warden_crypto::{constant_time_eq, Key, KeyStream, StreamCipher, DIGEST_LEN};
use warden_protocol::{messages, read_checked, ClientModule, ClientOpcode, PacketReader, ProtocolResult};

use crate::config::WardenConfig;
use crate::error::EngineResult;
use crate::penalty::{ActionTaken, PenaltyPolicy};
use crate::platform::{ClientPlatform, ResultReport};
use crate::scheduler::CategoryScheduler;
use crate::traits::{SessionControl, Transport};

use state::TimingSample;

/// Per-connection integrity verification.
pub struct IntegrityEngine<P, T, S> {
    config: WardenConfig,
    catalog: Arc<CheckCatalog>,
    platform: P,
    transport: T,
    session: S,
    policy: PenaltyPolicy,
    scheduler: CategoryScheduler,
    rng: ChaCha20Rng,

    module: ClientModule,
    init_messages: Vec<Vec<u8>>,
    seed: Key,
    input_key: Key,
    output_key: Key,
    inbound: StreamCipher,
    outbound: StreamCipher,

    state: HandshakeState,
    lifecycle: Lifecycle,
    started_at: Instant,
    next_check_at: Option<Instant>,
    response_deadline: Option<Instant>,
    pending: Option<PendingRequest>,
    last_timing: Option<TimingSample>,
    stats: EngineStats,
}

impl<P, T, S> IntegrityEngine<P, T, S>
where
    P: ClientPlatform,
    T: Transport,
    S: SessionControl,
{
    /// Creates an engine and starts the handshake by sending the module.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is out of range or the platform's
    /// initialization blocks cannot be framed.
    pub fn new(
        config: WardenConfig,
        catalog: Arc<CheckCatalog>,
        platform: P,
        transport: T,
        session: S,
        now: Instant,
    ) -> EngineResult<Self> {
        Self::with_rng(config, catalog, platform, transport, session, now, ChaCha20Rng::from_entropy())
    }

    /// Creates an engine with an explicit random source.
    ///
    /// # Errors
    ///
    /// As [`IntegrityEngine::new`].
    pub fn with_rng(
        config: WardenConfig,
        catalog: Arc<CheckCatalog>,
        platform: P,
        transport: T,
        session: S,
        now: Instant,
        mut rng: ChaCha20Rng,
    ) -> EngineResult<Self> {
        config.validate()?;

        // Draw order is part of the protocol: input, output, seed
        let mut keys = KeyStream::new(transport.shared_secret());
        let input_key: Key = keys.next_array();
        let output_key: Key = keys.next_array();
        let seed: Key = keys.next_array();

        let module = ClientModule::build(platform.module_image());
        let init_messages = platform
            .initialization_blocks()
            .iter()
            .map(|block| messages::module_initialize(block))
            .collect::<ProtocolResult<Vec<_>>>()?;

        let scheduler = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(rng.next_u64()));
        let policy = PenaltyPolicy::from_config(&config);

        let mut engine = Self {
            config,
            catalog,
            platform,
            transport,
            session,
            policy,
            scheduler,
            rng,
            module,
            init_messages,
            seed,
            input_key,
            output_key,
            inbound: StreamCipher::new(&input_key),
            outbound: StreamCipher::new(&output_key),
            state: HandshakeState::AwaitingModuleAck,
            lifecycle: Lifecycle::Running,
            started_at: now,
            next_check_at: None,
            response_deadline: None,
            pending: None,
            last_timing: None,
            stats: EngineStats::default(),
        };

        info!(
            session_id = engine.session.session_id(),
            platform = engine.platform.name(),
            module_size = engine.module.compressed_size(),
            "warden handshake started"
        );
        engine.send_module();
        Ok(engine)
    }

    /// Processes one encrypted message from the client.
    pub fn on_bytes(&mut self, now: Instant, bytes: &[u8]) {
        if self.is_closed() {
            trace!(session_id = self.session.session_id(), "ignoring message after close");
            return;
        }

        let mut plain = bytes.to_vec();
        self.inbound.process(&mut plain);
        let mut reader = PacketReader::new(&plain);

        let Ok(raw) = reader.read_u8() else {
            self.unexpected_message(None);
            return;
        };
        let Ok(opcode) = ClientOpcode::from_u8(raw) else {
            self.unexpected_message(Some(raw));
            return;
        };

        match (self.state, opcode) {
            (HandshakeState::AwaitingModuleAck, ClientOpcode::ModuleMissing) => {
                debug!(session_id = self.session.session_id(), "client missing module, resending");
                self.send_module();
            }
            (HandshakeState::AwaitingModuleAck, ClientOpcode::ModuleOk) => {
                debug!(session_id = self.session.session_id(), "module loaded, sending hash request");
                let request = messages::hash_request(&self.seed);
                self.send(request);
                self.state = HandshakeState::AwaitingHashReply;
            }
            (HandshakeState::AwaitingHashReply, ClientOpcode::HashResult) => {
                self.handle_hash_result(now, &mut reader);
            }
            (HandshakeState::Active, ClientOpcode::CheatChecksResult) => {
                self.handle_check_result(now, &mut reader);
            }
            _ => self.unexpected_message(Some(raw)),
        }
    }

    /// Fires due deadlines: response timeout and the next check cycle.
    pub fn update(&mut self, now: Instant) {
        if self.is_closed() {
            return;
        }

        if self.response_deadline.is_some_and(|deadline| now >= deadline) {
            self.stats.violations += 1;
            error!(
                session_id = self.session.session_id(),
                checks = self.pending.as_ref().map_or(0, |p| p.check_ids.len()),
                "client did not answer warden request in time"
            );
            PenaltyPolicy::terminate("client response timeout", &mut self.session);
            self.shut_down(Lifecycle::Closed);
            return;
        }

        if self.state == HandshakeState::Active
            && self.pending.is_none()
            && self.next_check_at.is_some_and(|at| now >= at)
        {
            self.request_checks(now);
        }
    }

    /// Handles an addon message that may be a Lua check report.
    ///
    /// Returns false if the message is not a report and should be handled
    /// as ordinary chat.
    pub fn handle_lua_report(&mut self, message: &str) -> bool {
        let Some(body) = message.strip_prefix(LUA_REPORT_TOKEN) else {
            return false;
        };
        if self.is_closed() {
            return true;
        }
        self.stats.lua_reports += 1;

        let catalog = Arc::clone(&self.catalog);
        let check = body
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<u16>().ok())
            .and_then(|id| catalog.get(id))
            .filter(|check| check.kind == CheckKind::LuaEval);

        if let Some(check) = check {
            self.stats.failed_checks += 1;
            warn!(
                session_id = self.session.session_id(),
                check_id = check.id,
                comment = %check.comment,
                "Lua check reported by client"
            );
            self.penalize(check.action, Some(check), "failed Lua check");
        } else {
            self.stats.violations += 1;
            warn!(session_id = self.session.session_id(), report = body, "bogus Lua report");
            let action = self.policy.default_action();
            self.penalize(action, None, "bogus Lua report");
        }
        true
    }

    /// Stops the engine. In-flight checks are abandoned.
    pub fn close(&mut self) {
        if self.lifecycle != Lifecycle::Closed {
            debug!(session_id = self.session.session_id(), "warden closed");
        }
        self.shut_down(Lifecycle::Closed);
    }

    /// Handshake progress.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether the engine still runs.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns true once the engine no longer processes input.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle != Lifecycle::Running
    }

    /// Request awaiting its result.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// When the next request is due.
    #[must_use]
    pub const fn next_check_at(&self) -> Option<Instant> {
        self.next_check_at
    }

    /// When the pending request times out.
    #[must_use]
    pub const fn response_deadline(&self) -> Option<Instant> {
        self.response_deadline
    }

    /// Diagnostic counters.
    #[must_use]
    pub const fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CheckCatalog> {
        &self.catalog
    }

    /// Outbound collaborator.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Outbound collaborator, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Session collaborator.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    fn send(&mut self, mut packet: Vec<u8>) {
        self.outbound.process(&mut packet);
        self.transport.send(packet);
    }

    fn send_module(&mut self) {
        for chunk in self.module.cache_messages() {
            self.send(chunk);
        }
        let announce = self.module.use_message();
        self.send(announce);
    }

    fn handle_hash_result(&mut self, now: Instant, reader: &mut PacketReader<'_>) {
        let expected = self.platform.expected_hash_reply(&self.seed);
        let valid = reader
            .read_array::<DIGEST_LEN>()
            .is_ok_and(|reply| constant_time_eq(&reply, &expected));

        if !valid {
            self.stats.violations += 1;
            error!(session_id = self.session.session_id(), "warden hash reply mismatch");
            let action = self.policy.default_action();
            self.penalize(action, None, "module hash mismatch");
            if !self.is_closed() {
                self.shut_down(Lifecycle::Halted);
            }
            return;
        }

        let image = self.platform.module_image();
        self.input_key = image.client_key_seed;
        self.output_key = image.server_key_seed;
        self.inbound.prepare(&self.input_key);
        self.outbound.prepare(&self.output_key);
        self.state = HandshakeState::Active;

        for message in std::mem::take(&mut self.init_messages) {
            self.send(message);
        }

        let first = now + self.config.initial_check_delay();
        self.next_check_at = Some(first);
        info!(
            session_id = self.session.session_id(),
            first_check_in_secs = self.config.initial_check_delay_secs,
            "warden handshake complete"
        );
    }

    fn request_checks(&mut self, now: Instant) {
        let catalog = Arc::clone(&self.catalog);

        let mut ids = Vec::new();
        for category in Category::ALL {
            let count = self.config.count_for(category);
            ids.extend(self.scheduler.next_batch(category, count));
        }
        ids.shuffle(&mut self.rng);

        // Timing and the framing are always sent; checks are cut at the
        // first one that does not fit.
        let mut size = self.platform.request_overhead();
        let mut selected: Vec<&CheckDefinition> = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(check) = catalog.get(*id) else {
                continue;
            };
            let width = self.platform.check_wire_size(check);
            if size + width > self.config.max_request_size {
                debug!(
                    session_id = self.session.session_id(),
                    dropped = ids.len() - selected.len(),
                    size,
                    "request size limit reached"
                );
                break;
            }
            size += width;
            selected.push(check);
        }

        let server_ticks = self.ticks_at(now);
        let xor = self.input_key[0];
        let request = match self.platform.encode_request(&selected, xor, server_ticks, &mut self.rng) {
            Ok(request) => request,
            Err(error) => {
                error!(session_id = self.session.session_id(), %error, "failed to encode check request");
                self.next_check_at = Some(now + self.config.check_hold_off());
                return;
            }
        };

        debug!(
            session_id = self.session.session_id(),
            checks = selected.len(),
            bytes = request.len(),
            "sending check request"
        );
        self.send(request);
        self.stats.requests_sent += 1;
        self.pending = Some(PendingRequest {
            check_ids: selected.iter().map(|check| check.id).collect(),
            server_ticks,
            sent_at: now,
        });
        self.response_deadline = self.config.max_response_delay().map(|delay| now + delay);
        self.next_check_at = None;
    }

    fn handle_check_result(&mut self, now: Instant, reader: &mut PacketReader<'_>) {
        let Some(pending) = self.pending.take() else {
            debug!(session_id = self.session.session_id(), "stale check result ignored");
            return;
        };

        let payload = match read_checked(reader) {
            Ok(payload) => payload,
            Err(error) => {
                // The request stays open; its response deadline still runs
                self.pending = Some(pending);
                self.stats.violations += 1;
                warn!(session_id = self.session.session_id(), %error, "rejected check result");
                let action = self.policy.default_action();
                self.penalize(action, None, "corrupt check result");
                return;
            }
        };
        self.response_deadline = None;

        let catalog = Arc::clone(&self.catalog);
        match self.platform.decode_result(payload, &pending.check_ids, &catalog) {
            Ok(report) => self.evaluate(&report, &pending, &catalog),
            Err(error) => {
                self.stats.violations += 1;
                warn!(session_id = self.session.session_id(), %error, "malformed check result");
                let action = self.policy.default_action();
                self.penalize(action, None, "malformed check result");
            }
        }

        if !self.is_closed() {
            self.next_check_at = Some(now + self.config.check_hold_off());
        }
    }

    fn evaluate(&mut self, report: &ResultReport, pending: &PendingRequest, catalog: &CheckCatalog) {
        let session_id = self.session.session_id();

        let sample = TimingSample {
            server_ticks: pending.server_ticks,
            client_ticks: report.timing.client_ticks,
        };
        if report.timing.result == 0 {
            warn!(session_id, "client reported a timing check failure");
        }
        if let Some(previous) = self.last_timing {
            let drift = sample.drift_since(previous);
            if Duration::from_millis(u64::from(drift)) > self.config.timing_drift_tolerance() {
                warn!(session_id, drift_ms = drift, "client clock drift beyond tolerance");
            }
        }
        self.last_timing = Some(sample);

        let mut failures = report.failures.iter();
        let Some(first) = failures.next() else {
            self.stats.clean_results += 1;
            debug!(session_id, passed = report.passed, "check result clean");
            return;
        };
        self.stats.failed_checks += 1;

        // Only the first failure is acted upon
        for later in failures {
            self.stats.failed_checks += 1;
            warn!(session_id, check_id = later.check_id, reason = %later.reason, "additional check failed");
        }

        let check = catalog.get(first.check_id);
        warn!(
            session_id,
            check_id = first.check_id,
            kind = ?check.map(|c| c.kind),
            reason = %first.reason,
            "check failed"
        );
        let action = self.policy.action_for(check);
        self.penalize(action, check, "failed integrity check");
    }

    fn unexpected_message(&mut self, opcode: Option<u8>) {
        self.stats.violations += 1;
        warn!(
            session_id = self.session.session_id(),
            ?opcode,
            state = ?self.state,
            "unexpected warden message"
        );
        let action = self.config.unexpected_opcode_action;
        self.penalize(action, None, "unexpected message");
    }

    fn penalize(&mut self, action: Action, check: Option<&CheckDefinition>, cause: &str) -> ActionTaken {
        let taken = self.policy.apply_action(action, check, cause, &mut self.session);
        if taken.terminates() {
            self.shut_down(Lifecycle::Closed);
        }
        taken
    }

    fn shut_down(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
        self.pending = None;
        self.next_check_at = None;
        self.response_deadline = None;
    }

    fn ticks_at(&self, now: Instant) -> u32 {
        let millis = now.saturating_duration_since(self.started_at).as_millis();
        // The client counter wraps at 32 bits
        u32::try_from(millis & u128::from(u32::MAX)).unwrap_or_default()
    }
}

impl<P, T, S> std::fmt::Debug for IntegrityEngine<P, T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityEngine")
            .field("state", &self.state)
            .field("lifecycle", &self.lifecycle)
            .field("pending", &self.pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
