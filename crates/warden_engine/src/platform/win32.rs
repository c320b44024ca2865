//! # Win32 Client
//!
//! ## Request Layout
//!
//! ```text
//! [2] [len][string]... [0] [0x57^x] [kind^x][payload]... [x] [server_ticks:u32]
//!      └── string table ──┘  └timing┘ └──── entries ────┘  └end
//! ```
//!
//! String indices in entries are 1-based into the table; 0 names the main
//! executable.
//!
//! ## Result Layout
//!
//! ```text
//! [timing result:u8][client_ticks:u32] then per pending check:
//!   MEM      [status] [bytes; length]   (bytes only when status == 0)
//!   MPQ      [status] [sha1; 20]        (digest only when status == 0)
//!   LUA      [status] [len][text]       (text only when status == 0)
//!   others   [marker]                   (0xE9 = clean)
//! ```

use rand::RngCore;
use tracing::trace;
use warden_catalog::{CheckCatalog, CheckDefinition, CheckKind, CHECK_DATA_LEN};
use warden_crypto::{constant_time_eq, hmac_sha1, sha1_digest, Key, Sha1Digest, DIGEST_LEN};
use warden_protocol::{
    PacketReader, PacketWriter, ProtocolError, ProtocolResult, ServerOpcode, ModuleImage,
};

use super::{CheckFailure, ClientPlatform, FailureReason, ResultReport, TimingReply};

/// Marker byte of a check that found nothing.
pub(crate) const CLEAN_MARKER: u8 = 0xE9;

/// Module name index of the main executable.
const MAIN_EXECUTABLE: u8 = 0;

// Client functions the module imports at initialization.
const SFILE_OPEN_FILE: u32 = 0x0002_4F80;
const SFILE_GET_FILE_SIZE: u32 = 0x0021_8C70;
const SFILE_READ_FILE: u32 = 0x0002_2530;
const SFILE_CLOSE_FILE: u32 = 0x0002_2910;
const FRAMESCRIPT_GET_TEXT: u32 = 0x0041_9D40;
const PERFORMANCE_COUNTER: u32 = 0x0046_AE20;

/// The Windows x86 client.
#[derive(Clone, Debug)]
pub struct Win32Platform {
    image: ModuleImage,
}

impl Win32Platform {
    /// Creates the platform around a module image.
    #[must_use]
    pub fn new(image: ModuleImage) -> Self {
        Self { image }
    }

    /// Strings a check places in the request string table.
    fn strings(check: &CheckDefinition) -> Vec<String> {
        match check.kind {
            CheckKind::Mpq | CheckKind::Driver => vec![check.text.clone()],
            CheckKind::LuaEval => check.lua_script().into_iter().collect(),
            CheckKind::Mem
            | CheckKind::PageA
            | CheckKind::PageB
            | CheckKind::Module
            | CheckKind::Proc
            | CheckKind::Timing => Vec::new(),
        }
    }

    const fn payload_size(kind: CheckKind) -> usize {
        match kind {
            CheckKind::Proc | CheckKind::Timing => 0,
            CheckKind::Mem => 1 + 4 + 1,
            CheckKind::PageA | CheckKind::PageB => CHECK_DATA_LEN + 4 + 1,
            CheckKind::Mpq | CheckKind::LuaEval => 1,
            CheckKind::Driver => CHECK_DATA_LEN + 1,
            CheckKind::Module => 4 + DIGEST_LEN,
        }
    }
}

impl ClientPlatform for Win32Platform {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn module_image(&self) -> &ModuleImage {
        &self.image
    }

    fn expected_hash_reply(&self, seed: &Key) -> Sha1Digest {
        let mut input = Vec::with_capacity(seed.len() + self.image.client_key_seed.len());
        input.extend_from_slice(seed);
        input.extend_from_slice(&self.image.client_key_seed);
        sha1_digest(&input)
    }

    fn initialization_blocks(&self) -> Vec<Vec<u8>> {
        let mut storm = PacketWriter::with_capacity(20);
        storm
            .write_u8(1)
            .write_u8(0)
            .write_u8(1) // import type
            .write_u8(0) // library index
            .write_u32(SFILE_OPEN_FILE)
            .write_u32(SFILE_GET_FILE_SIZE)
            .write_u32(SFILE_READ_FILE)
            .write_u32(SFILE_CLOSE_FILE);

        let mut lua = PacketWriter::with_capacity(8);
        lua.write_u8(4)
            .write_u8(0)
            .write_u8(0)
            .write_u32(FRAMESCRIPT_GET_TEXT)
            .write_u8(1);

        let mut timing = PacketWriter::with_capacity(8);
        timing
            .write_u8(1)
            .write_u8(1)
            .write_u8(0)
            .write_u32(PERFORMANCE_COUNTER)
            .write_u8(1);

        vec![storm.into_bytes(), lua.into_bytes(), timing.into_bytes()]
    }

    fn request_overhead(&self) -> usize {
        // opcode, string table terminator, timing entry, end marker, ticks
        1 + 1 + 1 + 1 + 4
    }

    fn check_wire_size(&self, check: &CheckDefinition) -> usize {
        let strings: usize = Self::strings(check).iter().map(|s| 1 + s.len()).sum();
        1 + Self::payload_size(check.kind) + strings
    }

    fn encode_request(
        &self,
        checks: &[&CheckDefinition],
        xor: u8,
        server_ticks: u32,
        rng: &mut dyn RngCore,
    ) -> ProtocolResult<Vec<u8>> {
        let mut table = PacketWriter::new();
        let mut entries = PacketWriter::new();
        let mut next_index: usize = 1;

        entries.write_u8(CheckKind::Timing.code() ^ xor);

        for check in checks {
            let mut indices = Vec::new();
            for text in Self::strings(check) {
                table.write_short_bytes(text.as_bytes())?;
                indices.push(u8::try_from(next_index).map_err(|_| ProtocolError::FieldTooLong {
                    len: next_index,
                    limit: usize::from(u8::MAX),
                })?);
                next_index += 1;
            }

            entries.write_u8(check.kind.code() ^ xor);
            match check.kind {
                CheckKind::Mem => {
                    entries
                        .write_u8(MAIN_EXECUTABLE)
                        .write_u32(check.address)
                        .write_u8(check.length);
                }
                CheckKind::PageA | CheckKind::PageB => {
                    entries
                        .write_bytes(&check.data)
                        .write_u32(check.address)
                        .write_u8(check.length);
                }
                CheckKind::Mpq | CheckKind::LuaEval => {
                    entries.write_u8(indices[0]);
                }
                CheckKind::Driver => {
                    entries.write_bytes(&check.data).write_u8(indices[0]);
                }
                CheckKind::Module => {
                    let seed = rng.next_u32();
                    entries
                        .write_u32(seed)
                        .write_bytes(&hmac_sha1(&seed.to_le_bytes(), check.text.as_bytes()));
                }
                // Never loaded into a catalog
                CheckKind::Proc | CheckKind::Timing => {
                    return Err(ProtocolError::UnknownCheckType(check.kind.code()));
                }
            }
        }

        entries.write_u8(xor).write_u32(server_ticks);

        let mut request = PacketWriter::with_capacity(2 + table.len() + entries.len());
        request
            .write_u8(ServerOpcode::CheatChecksRequest as u8)
            .write_bytes(table.as_slice())
            .write_u8(0)
            .write_bytes(entries.as_slice());
        Ok(request.into_bytes())
    }

    fn decode_result(
        &self,
        payload: &[u8],
        pending: &[u16],
        catalog: &CheckCatalog,
    ) -> ProtocolResult<ResultReport> {
        let mut reader = PacketReader::new(payload);
        let timing = TimingReply {
            result: reader.read_u8()?,
            client_ticks: reader.read_u32()?,
        };

        let mut passed = 0;
        let mut failures = Vec::new();

        for &check_id in pending {
            let Some(check) = catalog.get(check_id) else {
                trace!(check_id, "pending check not in catalog, no data expected");
                continue;
            };

            let reason = match check.kind {
                CheckKind::Mem | CheckKind::Mpq => {
                    let status = reader.read_u8()?;
                    if status == 0 {
                        let len = if check.kind == CheckKind::Mem {
                            usize::from(check.length)
                        } else {
                            DIGEST_LEN
                        };
                        let returned = reader.read_bytes(len)?;
                        (!constant_time_eq(returned, &check.expected)).then_some(FailureReason::Mismatch)
                    } else {
                        Some(FailureReason::Status(status))
                    }
                }
                CheckKind::PageA
                | CheckKind::PageB
                | CheckKind::Driver
                | CheckKind::Module => {
                    let marker = reader.read_u8()?;
                    (marker != CLEAN_MARKER).then_some(FailureReason::Marker(marker))
                }
                // Lua checks report through the chat channel
                CheckKind::LuaEval => {
                    // Status 0: the script ran, its text follows
                    if reader.read_u8()? == 0 {
                        reader.read_short_bytes()?;
                    }
                    None
                }
                CheckKind::Proc | CheckKind::Timing => None,
            };

            match reason {
                Some(reason) => failures.push(CheckFailure { check_id, reason }),
                None => passed += 1,
            }
        }

        if reader.remaining() > 0 {
            trace!(extra = reader.remaining(), "trailing bytes after check results");
        }

        Ok(ResultReport {
            timing,
            passed,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use warden_catalog::{Action, CheckRow};

    fn platform() -> Win32Platform {
        Win32Platform::new(ModuleImage::new(vec![0xCC; 64], [1; 16], [2; 16]))
    }

    fn catalog() -> CheckCatalog {
        let rows = vec![
            CheckRow {
                id: 1,
                kind: CheckKind::Mem.code(),
                address: 0x0040_1000,
                length: 2,
                result: "9090".to_string(),
                ..CheckRow::default()
            },
            CheckRow {
                id: 2,
                kind: CheckKind::Mpq.code(),
                text: "Interface\\Glue.toc".to_string(),
                result: "11".repeat(20),
                ..CheckRow::default()
            },
            CheckRow {
                id: 3,
                kind: CheckKind::LuaEval.code(),
                text: "return false".to_string(),
                ..CheckRow::default()
            },
            CheckRow {
                id: 4,
                kind: CheckKind::Module.code(),
                text: "wpe.dll".to_string(),
                ..CheckRow::default()
            },
        ];
        CheckCatalog::load(&rows, Action::Kick).unwrap()
    }

    #[test]
    fn test_request_layout() {
        let catalog = catalog();
        let platform = platform();
        let checks: Vec<_> = [1, 2].iter().map(|id| catalog.get(*id).unwrap()).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(0);

        let request = platform.encode_request(&checks, 0x5A, 1234, &mut rng).unwrap();

        let mut reader = PacketReader::new(&request);
        assert_eq!(reader.read_u8().unwrap(), ServerOpcode::CheatChecksRequest as u8);
        assert_eq!(reader.read_short_bytes().unwrap(), b"Interface\\Glue.toc");
        assert_eq!(reader.read_u8().unwrap(), 0);
        assert_eq!(reader.read_u8().unwrap(), CheckKind::Timing.code() ^ 0x5A);
        assert_eq!(reader.read_u8().unwrap(), CheckKind::Mem.code() ^ 0x5A);
        assert_eq!(reader.read_u8().unwrap(), MAIN_EXECUTABLE);
        assert_eq!(reader.read_u32().unwrap(), 0x0040_1000);
        assert_eq!(reader.read_u8().unwrap(), 2);
        assert_eq!(reader.read_u8().unwrap(), CheckKind::Mpq.code() ^ 0x5A);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0x5A);
        assert_eq!(reader.read_u32().unwrap(), 1234);
        assert_eq!(reader.remaining(), 0);

        let expected: usize = platform.request_overhead()
            + checks.iter().map(|c| platform.check_wire_size(c)).sum::<usize>();
        assert_eq!(request.len(), expected);
    }

    #[test]
    fn test_module_entry_is_keyed_hash() {
        let catalog = catalog();
        let platform = platform();
        let module = catalog.get(4).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let request = platform.encode_request(&[module], 0, 0, &mut rng).unwrap();

        // opcode, empty table, timing, module kind
        let mut reader = PacketReader::new(&request[4..]);
        let seed = reader.read_u32().unwrap();
        let digest = reader.read_bytes(DIGEST_LEN).unwrap();
        assert_eq!(digest, hmac_sha1(&seed.to_le_bytes(), b"wpe.dll"));
        assert_eq!(request.len(), platform.request_overhead() + platform.check_wire_size(module));
    }

    #[test]
    fn test_decode_clean_result() {
        let catalog = catalog();
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(5000);
        payload.write_u8(0).write_bytes(&[0x90, 0x90]);
        payload.write_u8(0).write_bytes(&[0x11; 20]);
        payload.write_u8(0).write_short_bytes(b"false").unwrap();
        payload.write_u8(CLEAN_MARKER);

        let report = platform()
            .decode_result(payload.as_slice(), &[1, 2, 3, 4], &catalog)
            .unwrap();

        assert_eq!(report.timing.client_ticks, 5000);
        assert_eq!(report.passed, 4);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_decode_failures_in_wire_order() {
        let catalog = catalog();
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(0);
        payload.write_u8(0).write_bytes(&[0x90, 0x00]);
        payload.write_u8(1);
        payload.write_u8(1);
        payload.write_u8(0x00);

        let report = platform()
            .decode_result(payload.as_slice(), &[1, 2, 3, 4], &catalog)
            .unwrap();

        assert_eq!(
            report.failures,
            vec![
                CheckFailure {
                    check_id: 1,
                    reason: FailureReason::Mismatch
                },
                CheckFailure {
                    check_id: 2,
                    reason: FailureReason::Status(1)
                },
                CheckFailure {
                    check_id: 4,
                    reason: FailureReason::Marker(0)
                },
            ]
        );
        assert_eq!(report.passed, 1);
    }

    #[test]
    fn test_lua_text_follows_success_status() {
        let catalog = catalog();
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(0);
        payload.write_u8(0).write_short_bytes(&[CLEAN_MARKER; 3]).unwrap();
        payload.write_u8(CLEAN_MARKER);

        let report = platform()
            .decode_result(payload.as_slice(), &[3, 4], &catalog)
            .unwrap();
        assert_eq!(report.passed, 2);
        assert!(report.failures.is_empty());

        // An error status carries no text, the next byte is the module marker
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(0).write_u8(2).write_u8(0x00);

        let report = platform()
            .decode_result(payload.as_slice(), &[3, 4], &catalog)
            .unwrap();
        assert_eq!(
            report.failures,
            vec![CheckFailure {
                check_id: 4,
                reason: FailureReason::Marker(0)
            }]
        );
    }

    #[test]
    fn test_decode_truncated() {
        let catalog = catalog();
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(0).write_u8(0).write_u8(0x90);

        assert!(matches!(
            platform().decode_result(payload.as_slice(), &[1], &catalog),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_pending_id_reads_nothing() {
        let catalog = catalog();
        let mut payload = PacketWriter::new();
        payload.write_u8(1).write_u32(0).write_u8(CLEAN_MARKER);

        let report = platform()
            .decode_result(payload.as_slice(), &[999, 4], &catalog)
            .unwrap();
        assert_eq!(report.passed, 1);
    }

    #[test]
    fn test_hash_reply_depends_on_seed() {
        let platform = platform();
        assert_ne!(
            platform.expected_hash_reply(&[0; 16]),
            platform.expected_hash_reply(&[1; 16])
        );
        assert_eq!(platform.initialization_blocks().iter().map(Vec::len).collect::<Vec<_>>(), vec![20, 8, 8]);
    }
}
