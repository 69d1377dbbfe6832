//! Pause-ownership ledger.

use std::collections::{HashMap, HashSet};

use reclaim_torrent_core::Fingerprint;
use serde::{Deserialize, Serialize};

/// Who paused a torrent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PauseOwner {
    /// The user paused it.
    User,
    /// Recovery paused it and may resume it in the background.
    Recovery,
}

/// Per-fingerprint pause ownership plus the set of cancelled recoveries.
///
/// A fingerprint is eligible for background recovery iff it is owned by
/// [`PauseOwner::Recovery`] and is not cancelled.
#[derive(Debug, Clone, Default)]
pub struct PauseLedger {
    owners: HashMap<Fingerprint, PauseOwner>,
    cancelled: HashSet<Fingerprint>,
}

impl PauseLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recovery paused the torrent; clears any earlier cancellation.
    pub fn mark_paused_by_system(&mut self, fingerprint: &Fingerprint) {
        self.owners
            .insert(fingerprint.clone(), PauseOwner::Recovery);
        self.cancelled.remove(fingerprint);
    }

    /// The user paused the torrent; background recovery is cancelled.
    pub fn mark_paused_by_user(&mut self, fingerprint: &Fingerprint) {
        self.owners.insert(fingerprint.clone(), PauseOwner::User);
        self.cancelled.insert(fingerprint.clone());
    }

    /// Cancel background recovery without changing ownership.
    pub fn mark_cancelled(&mut self, fingerprint: &Fingerprint) {
        self.cancelled.insert(fingerprint.clone());
    }

    /// Forget ownership and cancellation. Returns whether anything was recorded.
    pub fn mark_resumed(&mut self, fingerprint: &Fingerprint) -> bool {
        let owned = self.owners.remove(fingerprint).is_some();
        let cancelled = self.cancelled.remove(fingerprint);
        owned || cancelled
    }

    /// Current owner of the pause, if any.
    #[must_use]
    pub fn owner(&self, fingerprint: &Fingerprint) -> Option<PauseOwner> {
        self.owners.get(fingerprint).copied()
    }

    /// Whether recovery for `fingerprint` was cancelled.
    #[must_use]
    pub fn is_cancelled(&self, fingerprint: &Fingerprint) -> bool {
        self.cancelled.contains(fingerprint)
    }

    /// Whether recovery may be retried automatically.
    #[must_use]
    pub fn is_background_recovery_eligible(&self, fingerprint: &Fingerprint) -> bool {
        self.owner(fingerprint) == Some(PauseOwner::Recovery) && !self.is_cancelled(fingerprint)
    }

    /// Drop every fingerprint not in `present`. Returns the dropped ones, sorted.
    pub fn retain_present(&mut self, present: &HashSet<Fingerprint>) -> Vec<Fingerprint> {
        let mut pruned: Vec<Fingerprint> = self
            .owners
            .keys()
            .chain(self.cancelled.iter())
            .filter(|fingerprint| !present.contains(*fingerprint))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        pruned.sort();
        self.owners
            .retain(|fingerprint, _| present.contains(fingerprint));
        self.cancelled.retain(|fingerprint| present.contains(fingerprint));
        pruned
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty() && self.cancelled.is_empty()
    }
}
