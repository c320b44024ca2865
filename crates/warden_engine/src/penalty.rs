//! # Penalty Policy
//!
//! Maps a failure to its consequence and carries it out.
//!
//! | Action | Effect                                    |
//! |--------|-------------------------------------------|
//! | Log    | warning in the log, connection untouched  |
//! | Kick   | session disconnected                      |
//! | Ban    | account banned, then session disconnected |

use std::time::Duration;

use tracing::warn;
use warden_catalog::{Action, CheckDefinition};

use crate::config::WardenConfig;
use crate::traits::SessionControl;

/// What a penalty actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTaken {
    /// Recorded only.
    Logged,
    /// Session disconnected.
    Kicked,
    /// Account banned and session disconnected.
    Banned,
}

impl ActionTaken {
    /// Returns true if the session was terminated.
    #[must_use]
    pub const fn terminates(self) -> bool {
        !matches!(self, Self::Logged)
    }
}

/// Applies actions through the session collaborator.
#[derive(Clone, Debug)]
pub struct PenaltyPolicy {
    default_action: Action,
    ban_duration: Duration,
}

impl PenaltyPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(default_action: Action, ban_duration: Duration) -> Self {
        Self {
            default_action,
            ban_duration,
        }
    }

    /// Creates the policy described by a configuration.
    #[must_use]
    pub const fn from_config(config: &WardenConfig) -> Self {
        Self::new(config.fail_action, config.ban_duration())
    }

    /// Action used when no check is identified.
    #[must_use]
    pub const fn default_action(&self) -> Action {
        self.default_action
    }

    /// Action for a failure: the check's own, else the default.
    #[must_use]
    pub fn action_for(&self, check: Option<&CheckDefinition>) -> Action {
        check.map_or(self.default_action, |check| check.action)
    }

    /// Applies the action for a failure.
    pub fn apply<S: SessionControl + ?Sized>(
        &self,
        check: Option<&CheckDefinition>,
        cause: &str,
        session: &mut S,
    ) -> ActionTaken {
        self.apply_action(self.action_for(check), check, cause, session)
    }

    /// Applies an explicit action.
    pub fn apply_action<S: SessionControl + ?Sized>(
        &self,
        action: Action,
        check: Option<&CheckDefinition>,
        cause: &str,
        session: &mut S,
    ) -> ActionTaken {
        let session_id = session.session_id();
        let check_id = check.map(|check| check.id);

        match action {
            Action::Log => {
                warn!(session_id, ?check_id, cause, "warden violation logged");
                ActionTaken::Logged
            }
            Action::Kick => {
                warn!(session_id, ?check_id, cause, "warden kick");
                session.kick(session_id, &Self::kick_reason(cause));
                ActionTaken::Kicked
            }
            Action::Ban => {
                let account_id = session.account_id();
                warn!(session_id, account_id, ?check_id, cause, "warden ban");
                session.ban_account(account_id, self.ban_duration, &Self::ban_reason(check));
                session.kick(session_id, &Self::kick_reason(cause));
                ActionTaken::Banned
            }
        }
    }

    /// Disconnects regardless of any configured action.
    pub fn terminate<S: SessionControl + ?Sized>(cause: &str, session: &mut S) -> ActionTaken {
        let session_id = session.session_id();
        warn!(session_id, cause, "warden terminating session");
        session.kick(session_id, &Self::kick_reason(cause));
        ActionTaken::Kicked
    }

    /// Reason recorded with a ban.
    #[must_use]
    pub fn ban_reason(check: Option<&CheckDefinition>) -> String {
        match check {
            Some(check) => format!(
                "Warden Anticheat Violation: {} (CheckId: {})",
                check.comment, check.id
            ),
            None => "Warden Anticheat Violation".to_string(),
        }
    }

    /// Reason shown with a kick.
    #[must_use]
    pub fn kick_reason(cause: &str) -> String {
        format!("Warden: {cause}")
    }
}
