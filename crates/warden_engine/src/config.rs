//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration:
//!
//! ```toml
//! num_inject_checks = 9
//! num_lua_checks = 1
//! num_modded_checks = 1
//! check_hold_off_secs = 30
//! max_response_delay_secs = 600
//! fail_action = "kick"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_catalog::{Action, Category};
use warden_protocol::TRANSPORT_MESSAGE_LIMIT;

/// Smallest request that still carries the opcode, an empty string table,
/// the timing check, the end marker and the server timestamp.
pub const MIN_REQUEST_SIZE: usize = 1 + 1 + 1 + 1 + 4;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed fields.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Tunables of the integrity engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Inject-category checks per request.
    pub num_inject_checks: usize,
    /// Lua-category checks per request.
    pub num_lua_checks: usize,
    /// Modded-category checks per request.
    pub num_modded_checks: usize,
    /// Delay between the handshake completing and the first request.
    pub initial_check_delay_secs: u64,
    /// Delay between a verified result and the next request.
    pub check_hold_off_secs: u64,
    /// How long the client may take to answer a request. Zero disables.
    pub max_response_delay_secs: u64,
    /// Action for failed checks without their own action and for protocol
    /// violations.
    pub fail_action: Action,
    /// Action for messages that are not valid in the current state.
    pub unexpected_opcode_action: Action,
    /// Length of bans issued by the engine.
    pub ban_duration_secs: u64,
    /// Largest serialized request.
    pub max_request_size: usize,
    /// Clock drift between consecutive results that is logged as suspicious.
    pub timing_drift_tolerance_ms: u64,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            num_inject_checks: 9,
            num_lua_checks: 1,
            num_modded_checks: 1,
            initial_check_delay_secs: 10,
            check_hold_off_secs: 30,
            max_response_delay_secs: 600,
            fail_action: Action::Kick,
            unexpected_opcode_action: Action::Log,
            ban_duration_secs: 86_400, // one day
            max_request_size: 450,
            timing_drift_tolerance_ms: 1_000,
        }
    }
}

impl WardenConfig {
    /// Parses and validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns `Parse` on malformed TOML and `Invalid` on out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`WardenConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_size < MIN_REQUEST_SIZE || self.max_request_size > TRANSPORT_MESSAGE_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_request_size",
                reason: format!(
                    "{} is outside {MIN_REQUEST_SIZE}..={TRANSPORT_MESSAGE_LIMIT}",
                    self.max_request_size
                ),
            });
        }
        Ok(())
    }

    /// Per-request quota of a category.
    #[must_use]
    pub const fn count_for(&self, category: Category) -> usize {
        match category {
            Category::Inject => self.num_inject_checks,
            Category::Lua => self.num_lua_checks,
            Category::Modded => self.num_modded_checks,
        }
    }

    /// Delay before the first request.
    #[must_use]
    pub const fn initial_check_delay(&self) -> Duration {
        Duration::from_secs(self.initial_check_delay_secs)
    }

    /// Delay between cycles, never below one second.
    #[must_use]
    pub fn check_hold_off(&self) -> Duration {
        Duration::from_secs(self.check_hold_off_secs.max(1))
    }

    /// Response deadline, `None` when disabled.
    #[must_use]
    pub const fn max_response_delay(&self) -> Option<Duration> {
        if self.max_response_delay_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.max_response_delay_secs))
        }
    }

    /// Length of bans.
    #[must_use]
    pub const fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_secs)
    }

    /// Drift tolerance between consecutive timing samples.
    #[must_use]
    pub const fn timing_drift_tolerance(&self) -> Duration {
        Duration::from_millis(self.timing_drift_tolerance_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(WardenConfig::from_toml_str("").unwrap(), WardenConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_fields() {
        let config = WardenConfig::from_toml_str(
            r#"
            num_inject_checks = 3
            fail_action = "ban"
            max_response_delay_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.count_for(Category::Inject), 3);
        assert_eq!(config.count_for(Category::Lua), 1);
        assert_eq!(config.fail_action, Action::Ban);
        assert_eq!(config.max_response_delay(), None);
    }

    #[test]
    fn test_hold_off_is_clamped() {
        let config = WardenConfig {
            check_hold_off_secs: 0,
            ..WardenConfig::default()
        };
        assert_eq!(config.check_hold_off(), Duration::from_secs(1));
    }

    #[test]
    fn test_request_size_range() {
        assert!(matches!(
            WardenConfig::from_toml_str("max_request_size = 4"),
            Err(ConfigError::Invalid { field: "max_request_size", .. })
        ));
        assert!(WardenConfig::from_toml_str("max_request_size = 9000").is_err());
    }

    #[test]
    fn test_unknown_action_is_parse_error() {
        assert!(matches!(
            WardenConfig::from_toml_str("fail_action = \"explode\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
