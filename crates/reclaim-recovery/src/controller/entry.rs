//! Queue entries and their completion handles.

use reclaim_torrent_core::{Fingerprint, RecoveryAction, TorrentSnapshot};
use tokio::sync::watch;

use crate::classify::MissingFilesClassification;
use crate::error::{RecoveryError, RecoveryResult};
use crate::outcome::{RecoveryGateOutcome, RecoveryOutcome};

/// Awaitable result of one queued recovery.
///
/// Clones observe the same resolution. Each entry resolves at most once;
/// later resolution attempts leave the first result in place.
#[derive(Debug, Clone)]
pub struct RecoveryCompletion {
    fingerprint: Fingerprint,
    receiver: watch::Receiver<Option<RecoveryGateOutcome>>,
}

impl RecoveryCompletion {
    /// Fingerprint of the torrent this completion belongs to.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Resolved result, if the entry has been finalized.
    #[must_use]
    pub fn outcome(&self) -> Option<RecoveryGateOutcome> {
        *self.receiver.borrow()
    }

    /// Whether both handles observe the same entry.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.receiver.same_channel(&other.receiver)
    }

    /// Wait for the entry to be finalized.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::CompletionDropped`] if the controller released
    /// the entry without resolving it.
    pub async fn wait(mut self) -> RecoveryResult<RecoveryGateOutcome> {
        let resolved = self
            .receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| *value);
        resolved.ok_or_else(|| RecoveryError::CompletionDropped {
            fingerprint: self.fingerprint.to_string(),
        })
    }
}

/// Resolving half of a [`RecoveryCompletion`].
#[derive(Debug)]
pub(crate) struct CompletionResolver {
    sender: watch::Sender<Option<RecoveryGateOutcome>>,
}

impl CompletionResolver {
    /// Resolve with `outcome`. Returns `false` if already resolved.
    pub(crate) fn resolve(&self, outcome: RecoveryGateOutcome) -> bool {
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

fn completion_pair(fingerprint: Fingerprint) -> (CompletionResolver, RecoveryCompletion) {
    let (sender, receiver) = watch::channel(None);
    (
        CompletionResolver { sender },
        RecoveryCompletion {
            fingerprint,
            receiver,
        },
    )
}

/// A recovery request waiting for, or bound to, the active session.
#[derive(Debug)]
pub struct RecoveryQueueEntry {
    /// Torrent as last reported by the daemon.
    pub torrent: TorrentSnapshot,
    /// Requested action.
    pub action: RecoveryAction,
    /// Outcome to display.
    pub outcome: RecoveryOutcome,
    /// Classification computed when the request was made.
    pub classification: MissingFilesClassification,
    /// Recovery identity of the torrent.
    pub fingerprint: Fingerprint,
    /// Whether the session waits for user input before closing.
    pub requires_decision: bool,
    pub(crate) completion: RecoveryCompletion,
    pub(crate) resolver: CompletionResolver,
}

impl RecoveryQueueEntry {
    /// Build an entry with a fresh, unresolved completion. Requires a decision
    /// unless changed with [`RecoveryQueueEntry::with_requires_decision`].
    #[must_use]
    pub fn new(
        torrent: TorrentSnapshot,
        action: RecoveryAction,
        outcome: RecoveryOutcome,
        classification: MissingFilesClassification,
        fingerprint: Fingerprint,
    ) -> Self {
        let (resolver, completion) = completion_pair(fingerprint.clone());
        Self {
            torrent,
            action,
            outcome,
            classification,
            fingerprint,
            requires_decision: true,
            completion,
            resolver,
        }
    }

    /// Set whether the session waits for user input.
    #[must_use]
    pub const fn with_requires_decision(mut self, requires_decision: bool) -> Self {
        self.requires_decision = requires_decision;
        self
    }

    /// Handle resolving when this entry is finalized.
    #[must_use]
    pub fn completion(&self) -> RecoveryCompletion {
        self.completion.clone()
    }
}
