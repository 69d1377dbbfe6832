//! Background task feeding daemon snapshots into reconciliation.

use std::sync::Arc;
use std::time::Duration;

use reclaim_torrent_core::TorrentInspector;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::RecoveryController;

/// Poll `inspector` every `interval` and reconcile the controller with the result.
///
/// The first poll happens immediately. Failed polls are logged and retried on
/// the next tick. The task exits once `shutdown` is cancelled.
#[must_use]
pub fn spawn_reconciler(
    controller: RecoveryController,
    inspector: Arc<dyn TorrentInspector>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis(), "recovery reconciler started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match inspector.list().await {
                Ok(snapshots) => {
                    let report = controller.reconcile(&snapshots);
                    if !report.is_empty() {
                        debug!(
                            torrents = snapshots.len(),
                            cleared = report.cleared.len(),
                            pruned = report.pruned.len(),
                            cancelled = report.cancelled.len(),
                            "snapshot reconciled"
                        );
                    }
                }
                Err(err) => warn!(error = %err, "torrent snapshot poll failed"),
            }
        }

        info!("recovery reconciler stopped");
    })
}
