//! Read-only views handed to the rendering layer.

use std::fmt;

use reclaim_torrent_core::{Fingerprint, MissingFilesKind, RecoveryAction, TorrentSnapshot};
use serde::Serialize;

use super::entry::RecoveryQueueEntry;
use crate::classify::MissingFilesClassification;
use crate::outcome::RecoveryOutcome;

/// Identifier of one activation of a recovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The single visible recovery session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySession {
    /// Activation identifier.
    pub id: SessionId,
    /// Torrent being recovered.
    pub torrent: TorrentSnapshot,
    /// Requested action.
    pub action: RecoveryAction,
    /// Current outcome.
    pub outcome: RecoveryOutcome,
    /// Classification of the failure.
    pub classification: MissingFilesClassification,
    /// Recovery identity of the torrent.
    pub fingerprint: Fingerprint,
    /// Whether the session waits for user input.
    pub requires_decision: bool,
    /// When the session closes on its own (Unix milliseconds).
    pub auto_close_at_ms: Option<i64>,
}

/// Queue entry as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedRecoverySummary {
    /// Recovery identity of the torrent.
    pub fingerprint: Fingerprint,
    /// Display name.
    pub torrent_name: String,
    /// Failure category.
    pub kind: MissingFilesKind,
    /// Location to mention, when one is known.
    pub location_label: Option<String>,
}

impl QueuedRecoverySummary {
    pub(crate) fn from_entry(entry: &RecoveryQueueEntry) -> Self {
        let location_label = entry
            .classification
            .root
            .clone()
            .or_else(|| entry.classification.path.clone())
            .or_else(|| entry.torrent.download_dir.clone());
        Self {
            fingerprint: entry.fingerprint.clone(),
            torrent_name: entry.torrent.display_name().to_string(),
            kind: entry.classification.kind,
            location_label,
        }
    }
}

/// Controller state for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryViewState {
    /// Active session, if any.
    pub session: Option<RecoverySession>,
    /// Whether an action is running for the active session.
    pub is_busy: bool,
    /// Whether the open detail view belongs to a torrent other than the active session's.
    pub is_detail_recovery_blocked: bool,
    /// Number of queued requests.
    pub queued_count: usize,
    /// Queued requests in promotion order.
    pub queued_items: Vec<QueuedRecoverySummary>,
}
