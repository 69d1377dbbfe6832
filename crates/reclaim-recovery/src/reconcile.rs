//! Reconciliation of controller bookkeeping against daemon snapshots.

use std::collections::{HashMap, HashSet};

use reclaim_events::Event;
use reclaim_torrent_core::{Fingerprint, TorrentSnapshot};
use serde::Serialize;
use tracing::{debug, info};

use crate::controller::RecoveryController;
use crate::outcome::RecoveryGateOutcome;

/// Changes applied by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Fingerprints whose pause ownership was cleared because the torrent is active again.
    pub cleared: Vec<Fingerprint>,
    /// Ledger fingerprints dropped because their torrent is gone.
    pub pruned: Vec<Fingerprint>,
    /// Queued or active requests cancelled because their torrent is gone.
    pub cancelled: Vec<Fingerprint>,
    /// Classification overrides dropped because their torrent is gone.
    pub overrides_pruned: usize,
}

impl ReconcileReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty()
            && self.pruned.is_empty()
            && self.cancelled.is_empty()
            && self.overrides_pruned == 0
    }
}

impl RecoveryController {
    /// Apply a fresh torrent list to the controller.
    ///
    /// The torrent shown in the detail view counts as present even when the
    /// batch omits it. Torrents in an active state lose their pause ownership
    /// and cancellation regardless of any error envelope still attached.
    /// Requests whose torrent (matched by id or info hash) is missing from the
    /// batch resolve as cancelled. Ledger entries are kept per fingerprint and
    /// dropped once no listed torrent carries that fingerprint.
    pub fn reconcile(&self, snapshots: &[TorrentSnapshot]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut state = self.lock();

        let by_id: HashMap<&str, &TorrentSnapshot> = snapshots
            .iter()
            .map(|torrent| (torrent.id.as_str(), torrent))
            .collect();
        if let Some(refreshed) = state
            .detail
            .as_ref()
            .and_then(|detail| by_id.get(detail.id.as_str()))
        {
            state.detail = Some((*refreshed).clone());
        }
        let detail = state.detail.clone();
        let batch: Vec<&TorrentSnapshot> = snapshots
            .iter()
            .chain(
                detail
                    .as_ref()
                    .filter(|detail| !by_id.contains_key(detail.id.as_str())),
            )
            .collect();

        let mut present = HashSet::with_capacity(batch.len());
        for torrent in &batch {
            let fingerprint = Fingerprint::of(torrent);
            if torrent.state.is_active() && state.ledger.mark_resumed(&fingerprint) {
                debug!(fingerprint = %fingerprint, state = torrent.state.as_str(), "ownership cleared by live state");
                self.emit(Event::OwnershipCleared {
                    fingerprint: fingerprint.to_string(),
                });
                report.cleared.push(fingerprint.clone());
            }
            present.insert(fingerprint);
        }

        let ids: HashSet<&str> = batch.iter().map(|torrent| torrent.id.as_str()).collect();
        let hashes: HashSet<&str> = batch
            .iter()
            .filter_map(|torrent| torrent.hash.as_deref())
            .collect();
        let listed = |torrent: &TorrentSnapshot| {
            ids.contains(torrent.id.as_str())
                || torrent
                    .hash
                    .as_deref()
                    .is_some_and(|hash| hashes.contains(hash))
        };

        report.cancelled = self.resolve_pending_where(
            &mut state,
            RecoveryGateOutcome::Cancelled,
            |entry| !listed(&entry.torrent),
        );
        let vanished = state
            .active
            .as_ref()
            .filter(|active| !listed(&active.session.torrent))
            .map(|active| active.session.fingerprint.clone());
        if let Some(fingerprint) = vanished {
            info!(fingerprint = %fingerprint, "torrent under recovery disappeared");
            self.finalize_locked(&mut state, RecoveryGateOutcome::Cancelled);
            report.cancelled.push(fingerprint);
        }

        report.pruned = state.ledger.retain_present(&present);
        if !report.pruned.is_empty() {
            self.metrics().add_ownership_pruned(report.pruned.len());
            self.emit(Event::StatePruned {
                fingerprints: report.pruned.iter().map(ToString::to_string).collect(),
            });
        }

        let by_hash: HashMap<&str, &TorrentSnapshot> = batch
            .iter()
            .filter_map(|torrent| torrent.hash.as_deref().map(|hash| (hash, *torrent)))
            .collect();
        let current = |torrent: &TorrentSnapshot| {
            by_id.get(torrent.id.as_str()).copied().or_else(|| {
                torrent
                    .hash
                    .as_deref()
                    .and_then(|hash| by_hash.get(hash).copied())
            })
        };
        if let Some(active) = state.active.as_mut()
            && let Some(torrent) = current(&active.session.torrent)
        {
            active.session.torrent = torrent.clone();
        }
        for entry in &mut state.pending {
            if let Some(torrent) = current(&entry.torrent) {
                entry.torrent = torrent.clone();
            }
        }

        let keys: HashSet<&str> = batch
            .iter()
            .copied()
            .flat_map(|torrent| {
                std::iter::once(torrent.id.as_str()).chain(torrent.hash.as_deref())
            })
            .collect();
        report.overrides_pruned = state.overrides.prune(&keys);

        Self::check(&state);
        if !report.is_empty() {
            debug!(
                cleared = report.cleared.len(),
                pruned = report.pruned.len(),
                cancelled = report.cancelled.len(),
                overrides_pruned = report.overrides_pruned,
                "reconciliation applied"
            );
        }
        report
    }
}
