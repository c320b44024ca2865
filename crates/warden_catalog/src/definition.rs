//! # Check Definitions
//!
//! A stored row is untrusted data entry. `CheckDefinition::from_row` turns
//! it into a definition the engine can encode and validate without further
//! checks, or explains why it cannot.

use serde::{Deserialize, Serialize};

use crate::error::RowError;
use crate::kind::{Action, CheckKind};

/// Page and driver checks carry a 4-byte seed and a 20-byte digest.
pub const CHECK_DATA_LEN: usize = 24;

/// Mpq results are a SHA-1 of the file.
const MPQ_RESULT_LEN: usize = 20;

/// Lua check ids are sent as four decimal digits.
pub const MAX_LUA_CHECK_ID: u16 = 9999;

/// Longest script the client string table can carry.
pub const MAX_LUA_SCRIPT_LENGTH: usize = 255;

/// Token that starts every asynchronous Lua report.
pub const LUA_REPORT_TOKEN: &str = "_TW\t";

const LUA_SCRIPT_PREFIX: &str = "local S,T,R=SendAddonMessage,function()";
const LUA_SCRIPT_MIDFIX: &str = " end R=S and T()if R then S('_TW','";
const LUA_SCRIPT_POSTFIX: &str = "','GUILD')end";

/// Longest Lua check body that still fits the script wrapper.
pub const MAX_LUA_CHECK_LENGTH: usize = MAX_LUA_SCRIPT_LENGTH
    - LUA_SCRIPT_PREFIX.len()
    - LUA_SCRIPT_MIDFIX.len()
    - 4
    - LUA_SCRIPT_POSTFIX.len();

/// Builds the report text a client produces when a Lua check fires.
#[must_use]
pub fn lua_report_message(check_id: u16) -> String {
    format!("{LUA_REPORT_TOKEN}{check_id:04}")
}

/// A check row as persisted by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckRow {
    /// Check id.
    pub id: u32,
    /// Raw kind code.
    pub kind: u8,
    /// Hex-encoded kind-specific data.
    pub data: String,
    /// Hex-encoded expected result.
    pub result: String,
    /// Address to probe.
    pub address: u32,
    /// Number of bytes to probe.
    pub length: u8,
    /// Module name, file path or Lua body.
    #[serde(rename = "str")]
    pub text: String,
    /// Human readable description.
    pub comment: String,
}

/// A sparse action override as persisted by the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRow {
    /// Check id to override.
    pub id: u32,
    /// Raw action value.
    pub action: u8,
}

/// A validated integrity check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckDefinition {
    /// Check id.
    pub id: u16,
    /// Kind of probe.
    pub kind: CheckKind,
    /// Address to probe.
    pub address: u32,
    /// Number of bytes to probe.
    pub length: u8,
    /// Kind-specific data (seed + digest for page and driver checks).
    pub data: Vec<u8>,
    /// Module name, file path or Lua body.
    pub text: String,
    /// Expected result bytes for kinds compared by equality.
    pub expected: Vec<u8>,
    /// Human readable description.
    pub comment: String,
    /// Action applied when this check fails.
    pub action: Action,
}

impl CheckDefinition {
    /// Validates a stored row.
    ///
    /// # Errors
    ///
    /// Returns the first reason the row cannot be used.
    pub fn from_row(row: &CheckRow, action: Action) -> Result<Self, RowError> {
        let id = u16::try_from(row.id).map_err(|_| RowError::IdOutOfRange(row.id))?;
        let kind = CheckKind::from_code(row.kind).ok_or(RowError::UnsupportedKind(row.kind))?;
        if kind.category().is_none() {
            return Err(RowError::Uncategorized(kind));
        }

        let data = decode_hex("data", &row.data)?;
        let expected = decode_hex("result", &row.result)?;

        match kind {
            CheckKind::LuaEval => {
                if id > MAX_LUA_CHECK_ID {
                    return Err(RowError::LuaIdOutOfRange(row.id));
                }
                if row.text.is_empty() {
                    return Err(RowError::MissingString(kind));
                }
                if row.text.len() > MAX_LUA_CHECK_LENGTH {
                    return Err(RowError::LuaScriptTooLong {
                        len: row.text.len(),
                        limit: MAX_LUA_CHECK_LENGTH,
                    });
                }
            }
            CheckKind::Mem => {
                if expected.is_empty() {
                    return Err(RowError::MissingResult(kind));
                }
                if expected.len() != usize::from(row.length) {
                    return Err(RowError::ResultLengthMismatch {
                        expected: usize::from(row.length),
                        actual: expected.len(),
                    });
                }
            }
            CheckKind::Mpq => {
                if row.text.is_empty() {
                    return Err(RowError::MissingString(kind));
                }
                if expected.is_empty() {
                    return Err(RowError::MissingResult(kind));
                }
                if expected.len() != MPQ_RESULT_LEN {
                    return Err(RowError::ResultLengthMismatch {
                        expected: MPQ_RESULT_LEN,
                        actual: expected.len(),
                    });
                }
            }
            CheckKind::PageA | CheckKind::PageB | CheckKind::Driver => {
                if data.len() != CHECK_DATA_LEN {
                    return Err(RowError::MissingData {
                        kind,
                        expected: CHECK_DATA_LEN,
                        actual: data.len(),
                    });
                }
                if kind == CheckKind::Driver && row.text.is_empty() {
                    return Err(RowError::MissingString(kind));
                }
            }
            CheckKind::Module => {
                if row.text.is_empty() {
                    return Err(RowError::MissingString(kind));
                }
            }
            // Rejected above as uncategorized
            CheckKind::Proc | CheckKind::Timing => return Err(RowError::Uncategorized(kind)),
        }

        Ok(Self {
            id,
            kind,
            address: row.address,
            length: row.length,
            data,
            text: row.text.clone(),
            expected,
            comment: row.comment.clone(),
            action,
        })
    }

    /// Returns the full client script for a Lua check.
    ///
    /// ```text
    /// local S,T,R=SendAddonMessage,function() <body> end R=S and T()if R then S('_TW','0042','GUILD')end
    /// ```
    #[must_use]
    pub fn lua_script(&self) -> Option<String> {
        (self.kind == CheckKind::LuaEval).then(|| {
            format!(
                "{LUA_SCRIPT_PREFIX}{body}{LUA_SCRIPT_MIDFIX}{id:04}{LUA_SCRIPT_POSTFIX}",
                body = self.text,
                id = self.id
            )
        })
    }
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, RowError> {
    hex::decode(value.trim()).map_err(|e| RowError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}
