//! # Simulation
//!
//! A scripted client and recording collaborators, so the full protocol can
//! run in-process without a game client or a socket.
//!
//! ```text
//! IntegrityEngine ──send──► RecordingTransport ──drain──► SimulatedClient
//!        ▲                                                     │
//!        └──────────────────── on_bytes(reply) ◄───────────────┘
//! ```
//!
//! The client answers from the catalog, as an unmodified client would, unless
//! its `ClientBehavior` says otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use warden_catalog::{lua_report_message, CheckCatalog, CheckKind, CHECK_DATA_LEN};
use warden_crypto::{sha1_digest, Key, KeyStream, StreamCipher, DIGEST_LEN};
use warden_protocol::{
    encode_checked, messages, read_checked, ClientModule, ClientOpcode, ModuleImage, PacketReader,
    PacketWriter, ProtocolError, ProtocolResult, ServerOpcode,
};

use crate::engine::IntegrityEngine;
use crate::platform::{ClientPlatform, CLEAN_MARKER};
use crate::traits::{SessionControl, Transport};

/// Tick counter of the simulated client when the session starts.
const CLIENT_BOOT_TICKS: u32 = 3_600_000;

// ============================================================================
// COLLABORATORS
// ============================================================================

/// Transport that keeps every sent packet until drained.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    secret: Vec<u8>,
    outbox: Vec<Vec<u8>>,
    sent: usize,
}

impl RecordingTransport {
    /// Creates a transport for a session secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            outbox: Vec::new(),
            sent: 0,
        }
    }

    /// Takes the packets sent since the last drain.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    /// Packets sent over the lifetime of the transport.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, packet: Vec<u8>) {
        self.sent += 1;
        self.outbox.push(packet);
    }

    fn shared_secret(&self) -> &[u8] {
        &self.secret
    }
}

/// Kicks and bans issued against a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionLog {
    /// `(session_id, reason)` per kick.
    pub kicks: Vec<(u64, String)>,
    /// `(account_id, duration, reason)` per ban.
    pub bans: Vec<(u32, Duration, String)>,
}

/// Handle to a session log that outlives the engine.
pub type SharedLog = Arc<Mutex<SessionLog>>;

/// Session that records penalties instead of enforcing them.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    session_id: u64,
    account_id: u32,
    log: SharedLog,
}

impl RecordingSession {
    /// Creates a session.
    #[must_use]
    pub fn new(session_id: u64, account_id: u32) -> Self {
        Self {
            session_id,
            account_id,
            log: Arc::default(),
        }
    }

    /// Shared log of penalties.
    #[must_use]
    pub fn log(&self) -> &SharedLog {
        &self.log
    }
}

impl SessionControl for RecordingSession {
    fn session_id(&self) -> u64 {
        self.session_id
    }

    fn account_id(&self) -> u32 {
        self.account_id
    }

    fn kick(&mut self, session_id: u64, reason: &str) {
        self.log.lock().kicks.push((session_id, reason.to_string()));
    }

    fn ban_account(&mut self, account_id: u32, duration: Duration, reason: &str) {
        self.log.lock().bans.push((account_id, duration, reason.to_string()));
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// How the simulated client deviates from an unmodified one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientBehavior {
    /// Answer the first module announcement with `ModuleMissing`.
    pub lose_first_transfer: bool,
    /// Answer the hash challenge with a wrong digest.
    pub wrong_hash: bool,
    /// Memory patched at these addresses.
    pub patched_memory: Vec<(u32, Vec<u8>)>,
    /// Page, driver and module scans find something.
    pub injected: bool,
    /// Lua checks fire and report back.
    pub lua_hooked: bool,
    /// Check results are sent with a broken checksum.
    pub corrupt_checksum: bool,
    /// Check requests are never answered.
    pub silent: bool,
    /// Milliseconds the client clock gains per cycle.
    pub drift_per_cycle_ms: u32,
}

impl ClientBehavior {
    /// An unmodified client.
    #[must_use]
    pub fn honest() -> Self {
        Self::default()
    }
}

/// Client side of the protocol.
pub struct SimulatedClient {
    behavior: ClientBehavior,
    image: ModuleImage,
    inbound: StreamCipher,
    outbound: StreamCipher,
    transfer: Vec<u8>,
    announcements: usize,
    module_loaded: bool,
    init_blocks: usize,
    requests_answered: usize,
    drift: u32,
    memory: HashMap<u32, Vec<u8>>,
    files: HashMap<String, Vec<u8>>,
    lua_reports: Vec<String>,
}

impl SimulatedClient {
    /// Creates a client that shares `secret` with the server and whose
    /// memory and data files match the catalog.
    #[must_use]
    pub fn new(secret: &[u8], image: ModuleImage, catalog: &CheckCatalog, behavior: ClientBehavior) -> Self {
        let mut keys = KeyStream::new(secret);
        let server_input: Key = keys.next_array();
        let server_output: Key = keys.next_array();

        let mut memory = HashMap::new();
        let mut files = HashMap::new();
        for check in catalog.iter() {
            match check.kind {
                CheckKind::Mem => {
                    memory.insert(check.address, check.expected.clone());
                }
                CheckKind::Mpq => {
                    files.insert(check.text.clone(), check.expected.clone());
                }
                _ => {}
            }
        }
        for (address, bytes) in &behavior.patched_memory {
            memory.insert(*address, bytes.clone());
        }

        Self {
            behavior,
            image,
            inbound: StreamCipher::new(&server_output),
            outbound: StreamCipher::new(&server_input),
            transfer: Vec::new(),
            announcements: 0,
            module_loaded: false,
            init_blocks: 0,
            requests_answered: 0,
            drift: 0,
            memory,
            files,
            lua_reports: Vec::new(),
        }
    }

    /// Returns true once the module was received and unpacked.
    #[must_use]
    pub const fn module_loaded(&self) -> bool {
        self.module_loaded
    }

    /// `ModuleInitialize` blocks received.
    #[must_use]
    pub const fn init_blocks(&self) -> usize {
        self.init_blocks
    }

    /// Check requests answered.
    #[must_use]
    pub const fn requests_answered(&self) -> usize {
        self.requests_answered
    }

    /// Takes the Lua reports produced since the last call.
    pub fn take_lua_reports(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lua_reports)
    }

    /// Processes one encrypted server message and returns encrypted replies.
    ///
    /// # Errors
    ///
    /// Returns an error if the server message is malformed.
    pub fn receive(&mut self, packet: &[u8]) -> ProtocolResult<Vec<Vec<u8>>> {
        let mut plain = packet.to_vec();
        self.inbound.process(&mut plain);
        let mut reader = PacketReader::new(&plain);

        let replies = match ServerOpcode::from_u8(reader.read_u8()?)? {
            ServerOpcode::ModuleCache => {
                let len = reader.read_u16()?;
                self.transfer.extend_from_slice(reader.read_bytes(usize::from(len))?);
                Vec::new()
            }
            ServerOpcode::ModuleUse => vec![self.load_module(&mut reader)?],
            ServerOpcode::HashRequest => {
                let seed: Key = reader.read_array()?;
                let mut input = seed.to_vec();
                input.extend_from_slice(&self.image.client_key_seed);
                let mut digest = sha1_digest(&input);
                if self.behavior.wrong_hash {
                    digest[0] ^= 0xFF;
                }
                let reply = self.seal(messages::hash_result(&digest));
                // The module switches keys right after answering
                self.outbound.prepare(&self.image.client_key_seed);
                self.inbound.prepare(&self.image.server_key_seed);
                vec![reply]
            }
            ServerOpcode::ModuleInitialize => {
                read_checked(&mut reader)?;
                self.init_blocks += 1;
                Vec::new()
            }
            ServerOpcode::CheatChecksRequest => {
                if self.behavior.silent {
                    Vec::new()
                } else {
                    vec![self.answer_checks(&mut reader)?]
                }
            }
        };
        Ok(replies)
    }

    fn seal(&mut self, mut message: Vec<u8>) -> Vec<u8> {
        self.outbound.process(&mut message);
        message
    }

    fn load_module(&mut self, reader: &mut PacketReader<'_>) -> ProtocolResult<Vec<u8>> {
        let _id: Key = reader.read_array()?;
        let key: Key = reader.read_array()?;
        let size = reader.read_u32()?;
        self.announcements += 1;

        let transfer = std::mem::take(&mut self.transfer);
        if self.behavior.lose_first_transfer && self.announcements == 1 {
            return Ok(self.seal(messages::client_signal(ClientOpcode::ModuleMissing)));
        }

        let complete = usize::try_from(size).is_ok_and(|size| size == transfer.len());
        let loaded = complete && ClientModule::unpack(&key, &transfer).is_ok_and(|code| code == self.image.code);
        self.module_loaded = loaded;
        let signal = if loaded {
            ClientOpcode::ModuleOk
        } else {
            ClientOpcode::ModuleFailed
        };
        Ok(self.seal(messages::client_signal(signal)))
    }

    fn answer_checks(&mut self, reader: &mut PacketReader<'_>) -> ProtocolResult<Vec<u8>> {
        let mut strings = Vec::new();
        loop {
            let text = reader.read_short_bytes()?;
            if text.is_empty() {
                break;
            }
            strings.push(String::from_utf8_lossy(text).into_owned());
        }

        let xor = reader.read_u8()? ^ CheckKind::Timing.code();
        let marker = if self.behavior.injected { 0x00 } else { CLEAN_MARKER };
        let mut body = PacketWriter::new();

        loop {
            let raw = reader.read_u8()?;
            if raw == xor {
                break;
            }
            let code = raw ^ xor;
            let kind = CheckKind::from_code(code).ok_or(ProtocolError::UnknownCheckType(code))?;
            match kind {
                CheckKind::Mem => {
                    reader.skip(1)?;
                    let address = reader.read_u32()?;
                    let len = usize::from(reader.read_u8()?);
                    let mut bytes = self.memory.get(&address).cloned().unwrap_or_default();
                    bytes.resize(len, 0);
                    body.write_u8(0).write_bytes(&bytes);
                }
                CheckKind::Mpq => {
                    let file = string_at(&strings, reader.read_u8()?)?;
                    let digest = self
                        .files
                        .get(file)
                        .cloned()
                        .unwrap_or_else(|| sha1_digest(file.as_bytes()).to_vec());
                    body.write_u8(0).write_bytes(&digest);
                }
                CheckKind::LuaEval => {
                    let script = string_at(&strings, reader.read_u8()?)?;
                    if self.behavior.lua_hooked {
                        if let Some(id) = reported_id(script) {
                            self.lua_reports.push(lua_report_message(id));
                        }
                    }
                    body.write_u8(0).write_short_bytes(b"")?;
                }
                CheckKind::PageA | CheckKind::PageB => {
                    reader.skip(CHECK_DATA_LEN + 4 + 1)?;
                    body.write_u8(marker);
                }
                CheckKind::Driver => {
                    reader.skip(CHECK_DATA_LEN + 1)?;
                    body.write_u8(marker);
                }
                CheckKind::Module => {
                    reader.skip(4 + DIGEST_LEN)?;
                    body.write_u8(marker);
                }
                CheckKind::Proc | CheckKind::Timing => {}
            }
        }

        let server_ticks = reader.read_u32()?;
        self.drift = self.drift.wrapping_add(self.behavior.drift_per_cycle_ms);
        let client_ticks = server_ticks
            .wrapping_add(CLIENT_BOOT_TICKS)
            .wrapping_add(self.drift);

        let mut payload = PacketWriter::with_capacity(5 + body.len());
        payload.write_u8(1).write_u32(client_ticks).write_bytes(body.as_slice());

        let mut frame = encode_checked(ClientOpcode::CheatChecksResult as u8, payload.as_slice())?;
        if self.behavior.corrupt_checksum {
            if let Some(last) = frame.last_mut() {
                *last ^= 0xFF;
            }
        }
        self.requests_answered += 1;
        Ok(self.seal(frame))
    }
}

impl std::fmt::Debug for SimulatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClient")
            .field("behavior", &self.behavior)
            .field("module_loaded", &self.module_loaded)
            .field("requests_answered", &self.requests_answered)
            .finish_non_exhaustive()
    }
}

/// Looks up a 1-based string table index.
fn string_at(strings: &[String], index: u8) -> ProtocolResult<&str> {
    usize::from(index)
        .checked_sub(1)
        .and_then(|i| strings.get(i))
        .map(String::as_str)
        .ok_or(ProtocolError::Truncated {
            needed: usize::from(index),
            remaining: strings.len(),
        })
}

/// Pulls the check id out of a wrapped Lua script.
fn reported_id(script: &str) -> Option<u16> {
    let (_, rest) = script.split_once("S('_TW','")?;
    rest.get(..4)?.parse().ok()
}

/// A deterministic stand-in for the compiled module.
#[must_use]
pub fn demo_image() -> ModuleImage {
    let mut stream = KeyStream::new(b"warden demo module");
    let mut code = b"\x4D\x5A".to_vec();
    code.extend(stream.next_bytes(2046));
    // Mostly zero padding, like a real section table
    code.resize(6 * 1024, 0);
    ModuleImage::new(code, stream.next_array(), stream.next_array())
}

/// Delivers everything the engine sent to the client and every reply back,
/// until both sides are quiet. Returns the number of server messages
/// delivered.
///
/// # Errors
///
/// Returns an error if the client cannot parse a server message.
pub fn exchange<P: ClientPlatform>(
    engine: &mut IntegrityEngine<P, RecordingTransport, RecordingSession>,
    client: &mut SimulatedClient,
    now: Instant,
) -> ProtocolResult<usize> {
    let mut delivered = 0;
    loop {
        let outgoing = engine.transport_mut().drain();
        if outgoing.is_empty() {
            break;
        }
        for packet in outgoing {
            delivered += 1;
            for reply in client.receive(&packet)? {
                engine.on_bytes(now, &reply);
            }
        }
        for report in client.take_lua_reports() {
            engine.handle_lua_report(&report);
        }
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_id() {
        assert_eq!(
            reported_id("local S,T,R=SendAddonMessage,function() return 1 end R=S and T()if R then S('_TW','0042','GUILD')end"),
            Some(42)
        );
        assert_eq!(reported_id("print(1)"), None);
    }

    #[test]
    fn test_demo_image_is_stable() {
        let a = demo_image();
        let b = demo_image();
        assert_eq!(a.code, b.code);
        assert_eq!(a.client_key_seed, b.client_key_seed);
        assert_ne!(a.client_key_seed, a.server_key_seed);
    }

    #[test]
    fn test_recording_transport_drains() {
        let mut transport = RecordingTransport::new(b"secret".to_vec());
        transport.send(vec![1]);
        transport.send(vec![2]);
        assert_eq!(transport.drain(), vec![vec![1], vec![2]]);
        assert!(transport.drain().is_empty());
        assert_eq!(transport.sent(), 2);
        assert_eq!(transport.shared_secret(), b"secret");
    }
}
