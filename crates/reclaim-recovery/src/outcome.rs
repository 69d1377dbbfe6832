//! Recovery outcomes shown to the user and terminal gate results.

use reclaim_torrent_core::RecoveryAction;
use serde::{Deserialize, Serialize};

/// Automatic step the daemon is currently performing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoDetail {
    /// Data is being re-verified.
    Verify,
    /// Trackers are being re-announced.
    Reannounce,
}

/// Why a human has to decide how recovery continues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The data or its folder cannot be found.
    Missing,
    /// The location cannot be written.
    Unwritable,
    /// The volume has no free space.
    DiskFull,
}

/// Why recovery cannot continue automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The daemon does not offer the required operation.
    Unsupported,
    /// The daemon rejected the operation.
    Failed,
}

/// State of a recovery attempt. Exactly one variant is live at a time and
/// each carries only its own fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The daemon is repairing the torrent on its own.
    AutoInProgress {
        /// Which automatic step is running.
        detail: AutoDetail,
    },
    /// The problem was resolved without user input.
    AutoRecovered,
    /// The user has to pick how to proceed.
    NeedsUserDecision {
        /// Why input is required.
        reason: DecisionReason,
        /// Path worth suggesting in the decision prompt.
        hint_path: Option<String>,
        /// Free space reported for the location, when it could be measured.
        free_bytes: Option<u64>,
    },
    /// Recovery cannot proceed.
    Blocked {
        /// Cause, when known.
        reason: Option<BlockReason>,
    },
    /// Recovery was abandoned.
    Cancelled,
}

impl RecoveryOutcome {
    /// Decision outcome without a free-space figure.
    #[must_use]
    pub fn decision(reason: DecisionReason, hint_path: Option<&str>) -> Self {
        Self::NeedsUserDecision {
            reason,
            hint_path: hint_path.map(str::to_string),
            free_bytes: None,
        }
    }

    /// Blocked outcome with a known cause.
    #[must_use]
    pub const fn blocked(reason: BlockReason) -> Self {
        Self::Blocked {
            reason: Some(reason),
        }
    }

    /// Stable label used in events and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AutoInProgress { .. } => "auto_in_progress",
            Self::AutoRecovered => "auto_recovered",
            Self::NeedsUserDecision { .. } => "needs_user_decision",
            Self::Blocked { .. } => "blocked",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Terminal result a queued recovery resolves with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryGateOutcome {
    /// Recovery finished and the chosen action, if any, was applied.
    Applied {
        /// Action that resolved the session.
        action: Option<RecoveryAction>,
    },
    /// Recovery was abandoned.
    Cancelled,
}

impl RecoveryGateOutcome {
    /// Status label (`applied` or `cancelled`).
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this is the cancelled result.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serialises_with_kind_tag() -> Result<(), serde_json::Error> {
        let outcome = RecoveryOutcome::decision(DecisionReason::DiskFull, Some("/data"));
        assert_eq!(
            serde_json::to_value(&outcome)?,
            json!({
                "kind": "needs_user_decision",
                "reason": "disk_full",
                "hint_path": "/data",
                "free_bytes": null,
            })
        );
        let auto = RecoveryOutcome::AutoInProgress {
            detail: AutoDetail::Reannounce,
        };
        assert_eq!(
            serde_json::to_value(&auto)?,
            json!({"kind": "auto_in_progress", "detail": "reannounce"})
        );
        Ok(())
    }

    #[test]
    fn gate_outcome_status_labels() {
        assert_eq!(RecoveryGateOutcome::Cancelled.status(), "cancelled");
        assert!(RecoveryGateOutcome::Cancelled.is_cancelled());
        let applied = RecoveryGateOutcome::Applied {
            action: Some(RecoveryAction::Locate),
        };
        assert_eq!(applied.status(), "applied");
        assert!(!applied.is_cancelled());
        assert_eq!(RecoveryOutcome::blocked(BlockReason::Failed).label(), "blocked");
    }
}
