use std::sync::Arc;
use std::time::Duration;

use reclaim_config::RecoveryConfig;
use reclaim_events::{Event, EventBus};
use reclaim_recovery::{
    AutoDetail, DecisionReason, ManualScheduler, RecoveryController, RecoveryGateOutcome,
    RecoveryOutcome, Scheduler,
};
use reclaim_telemetry::Metrics;
use reclaim_test_support::fixtures::TorrentFixture;
use reclaim_test_support::mocks::MockClient;
use reclaim_torrent_core::{Fingerprint, MissingFilesKind, RecoveryAction, TorrentState};

fn harness() -> anyhow::Result<(RecoveryController, ManualScheduler)> {
    let scheduler = ManualScheduler::starting_at(1_700_000_000_000);
    let controller = RecoveryController::new(
        Arc::new(scheduler.clone()),
        EventBus::new(),
        Metrics::new()?,
        RecoveryConfig::default(),
    );
    Ok((controller, scheduler))
}

fn active_id(controller: &RecoveryController) -> Option<String> {
    controller
        .active_session()
        .map(|session| session.torrent.id)
}

#[test]
fn fingerprint_is_stable_across_calls() {
    let torrent = TorrentFixture::missing("a", "fp-a").hash("abc").build();
    assert_eq!(Fingerprint::of(&torrent), Fingerprint::of(&torrent.clone()));

    let bare = TorrentFixture::new("a").hash("abc").build();
    assert_eq!(Fingerprint::of(&bare).as_str(), "abc");
}

#[tokio::test]
async fn queued_session_is_promoted_after_cancel() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let a = TorrentFixture::missing("a", "fp-a")
        .recovery_kind(MissingFilesKind::PathLoss)
        .build();
    let b = TorrentFixture::missing("b", "fp-b").build();

    let first = controller.request_recovery(a, RecoveryAction::Resume);
    let second = controller.request_recovery(b, RecoveryAction::DownloadMissing);
    assert_eq!(active_id(&controller).as_deref(), Some("a"));
    assert_eq!(controller.queued_count(), 1);
    let view = controller.state();
    assert_eq!(view.queued_items.len(), 1);
    assert_eq!(view.queued_items[0].fingerprint.as_str(), "fp-b");

    assert!(controller.finalize(RecoveryGateOutcome::Cancelled));
    assert_eq!(first.wait().await?, RecoveryGateOutcome::Cancelled);
    assert_eq!(active_id(&controller).as_deref(), Some("b"));
    assert_eq!(controller.queued_count(), 0);
    assert!(second.outcome().is_none());
    controller.debug_assert_consistent()?;
    Ok(())
}

#[test]
fn at_most_one_session_is_active() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    for id in ["a", "b", "c", "d"] {
        controller.request_recovery(
            TorrentFixture::missing(id, &format!("fp-{id}")).build(),
            RecoveryAction::Locate,
        );
        assert!(controller.active_session().is_some());
        controller.debug_assert_consistent()?;
    }
    assert_eq!(active_id(&controller).as_deref(), Some("a"));
    assert_eq!(controller.queued_count(), 3);
    Ok(())
}

#[test]
fn duplicate_requests_share_a_completion() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let a = TorrentFixture::missing("a", "fp-a").build();
    let b = TorrentFixture::missing("b", "fp-b").build();

    let active = controller.request_recovery(a.clone(), RecoveryAction::Locate);
    let again = controller.request_recovery(a, RecoveryAction::Verify);
    assert!(active.same_as(&again));

    let queued = controller.request_recovery(b.clone(), RecoveryAction::Locate);
    let queued_again = controller.request_recovery(b, RecoveryAction::Resume);
    assert!(queued.same_as(&queued_again));
    assert!(!queued.same_as(&active));

    assert_eq!(controller.queued_count(), 1);
    assert_eq!(controller.metrics().snapshot().duplicate_requests_total, 2);
    Ok(())
}

#[test]
fn finalize_promotes_in_fifo_order() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    for id in ["a", "b", "c"] {
        controller.request_recovery(
            TorrentFixture::missing(id, &format!("fp-{id}")).build(),
            RecoveryAction::Locate,
        );
    }

    let applied = RecoveryGateOutcome::Applied {
        action: Some(RecoveryAction::Locate),
    };
    let mut observed = vec![(active_id(&controller), controller.queued_count())];
    while controller.finalize(applied) {
        observed.push((active_id(&controller), controller.queued_count()));
    }
    assert_eq!(
        observed,
        vec![
            (Some("a".to_string()), 2),
            (Some("b".to_string()), 1),
            (Some("c".to_string()), 0),
            (None, 0),
        ]
    );
    assert!(!controller.finalize(applied));
    assert_eq!(controller.metrics().finalized_count("applied"), 3);
    Ok(())
}

#[tokio::test]
async fn finalized_entries_stay_terminal() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let first = controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Locate,
    );
    let stale_id = controller
        .active_session()
        .map(|session| session.id)
        .ok_or_else(|| anyhow::anyhow!("expected active session"))?;
    controller.request_recovery(
        TorrentFixture::missing("b", "fp-b").build(),
        RecoveryAction::Locate,
    );

    let applied = RecoveryGateOutcome::Applied {
        action: Some(RecoveryAction::Locate),
    };
    assert!(controller.finalize(applied));
    let promoted = controller.active_session();

    assert!(!controller.finalize_session(stale_id, RecoveryGateOutcome::Cancelled));
    assert!(!controller.cancel_for_fingerprint(&Fingerprint::new("fp-a"), RecoveryGateOutcome::Cancelled));
    assert_eq!(controller.active_session(), promoted);
    assert_eq!(first.wait().await?, applied);
    Ok(())
}

#[tokio::test]
async fn cancel_beats_pending_auto_close() -> anyhow::Result<()> {
    let (controller, scheduler) = harness()?;
    let first = controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Resume,
    );
    controller.request_recovery(
        TorrentFixture::missing("b", "fp-b").build(),
        RecoveryAction::Locate,
    );

    let delay = Duration::from_secs(3);
    assert!(controller.schedule_finalize(
        delay,
        RecoveryGateOutcome::Applied {
            action: Some(RecoveryAction::Resume)
        },
        RecoveryOutcome::AutoRecovered,
    ));
    assert!(controller.cancel_for_fingerprint(
        &Fingerprint::new("fp-a"),
        RecoveryGateOutcome::Cancelled
    ));
    let promoted = controller.active_session();
    assert_eq!(promoted.as_ref().map(|session| session.torrent.id.as_str()), Some("b"));

    scheduler.advance(delay * 2);
    assert_eq!(controller.active_session(), promoted);
    assert_eq!(first.wait().await?, RecoveryGateOutcome::Cancelled);
    assert_eq!(controller.metrics().finalized_count("cancelled"), 1);
    assert_eq!(controller.metrics().finalized_count("applied"), 0);
    assert!(controller.is_recovery_cancelled(&Fingerprint::new("fp-a")));
    controller.debug_assert_consistent()?;
    Ok(())
}

#[test]
fn replaced_auto_close_only_fires_once() -> anyhow::Result<()> {
    let (controller, scheduler) = harness()?;
    let completion = controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Resume,
    );
    let applied = RecoveryGateOutcome::Applied { action: None };
    controller.schedule_finalize(Duration::from_secs(1), applied, RecoveryOutcome::AutoRecovered);
    controller.schedule_finalize(Duration::from_secs(5), applied, RecoveryOutcome::AutoRecovered);

    scheduler.advance(Duration::from_secs(2));
    assert!(controller.active_session().is_some());
    scheduler.advance(Duration::from_secs(3));
    assert!(controller.active_session().is_none());
    assert_eq!(completion.outcome(), Some(applied));
    assert_eq!(controller.metrics().finalized_count("applied"), 1);
    Ok(())
}

#[test]
fn pause_ownership_transitions() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let fp = Fingerprint::new("fp-a");

    controller.mark_paused_by_system(&fp);
    assert!(controller.is_background_recovery_eligible(&fp));
    controller.mark_paused_by_user(&fp);
    assert!(!controller.is_background_recovery_eligible(&fp));
    assert!(controller.is_recovery_cancelled(&fp));

    controller.mark_resumed(&fp);
    assert!(controller.pause_owner(&fp).is_none());
    assert!(!controller.is_recovery_cancelled(&fp));
    Ok(())
}

#[test]
fn reconciliation_clears_stale_ownership() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let fp = Fingerprint::new("fp-a");
    controller.mark_paused_by_system(&fp);

    let downloading = TorrentFixture::missing("a", "fp-a")
        .state(TorrentState::Downloading)
        .build();
    assert!(downloading.error_envelope.is_some());
    controller.reconcile(&[downloading]);

    assert!(controller.pause_owner(&fp).is_none());
    assert!(!controller.is_background_recovery_eligible(&fp));
    Ok(())
}

#[test]
fn cancel_pending_queue_keeps_active_session() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let active = controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Locate,
    );
    let queued: Vec<_> = ["b", "c"]
        .into_iter()
        .map(|id| {
            controller.request_recovery(
                TorrentFixture::missing(id, &format!("fp-{id}")).build(),
                RecoveryAction::Locate,
            )
        })
        .collect();

    assert_eq!(controller.cancel_pending_recovery_queue(RecoveryGateOutcome::Cancelled), 2);
    assert!(queued
        .iter()
        .all(|completion| completion.outcome() == Some(RecoveryGateOutcome::Cancelled)));
    assert!(active.outcome().is_none());
    assert_eq!(active_id(&controller).as_deref(), Some("a"));
    assert_eq!(controller.cancel_pending_recovery_queue(RecoveryGateOutcome::Cancelled), 0);
    Ok(())
}

#[test]
fn initial_outcome_follows_action() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Verify,
    );
    let session = controller
        .active_session()
        .ok_or_else(|| anyhow::anyhow!("expected active session"))?;
    assert_eq!(
        session.outcome,
        RecoveryOutcome::AutoInProgress {
            detail: AutoDetail::Verify
        }
    );
    assert!(!session.requires_decision);

    controller.finalize(RecoveryGateOutcome::Cancelled);
    controller.request_recovery(
        TorrentFixture::missing("b", "fp-b").build(),
        RecoveryAction::ChooseLocation,
    );
    let session = controller
        .active_session()
        .ok_or_else(|| anyhow::anyhow!("expected active session"))?;
    assert_eq!(
        session.outcome,
        RecoveryOutcome::decision(DecisionReason::Missing, Some("/downloads"))
    );
    assert!(session.requires_decision);
    Ok(())
}

#[test]
fn transitions_publish_events() -> anyhow::Result<()> {
    let (controller, scheduler) = harness()?;
    let mut stream = controller.events().subscribe(None);
    controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Resume,
    );
    controller.request_recovery(
        TorrentFixture::missing("b", "fp-b").build(),
        RecoveryAction::Locate,
    );
    controller.schedule_finalize(
        Duration::from_millis(500),
        RecoveryGateOutcome::Applied { action: None },
        RecoveryOutcome::AutoRecovered,
    );
    scheduler.advance(Duration::from_millis(500));

    let mut kinds = Vec::new();
    while let Some(envelope) = stream.try_next() {
        kinds.push(envelope.event.kind());
    }
    assert_eq!(
        kinds,
        vec![
            "session_started",
            "queue_changed",
            "session_outcome_changed",
            "auto_close_scheduled",
            "session_finalized",
            "session_started",
            "queue_changed",
        ]
    );
    Ok(())
}

#[test]
fn auto_close_event_carries_deadline() -> anyhow::Result<()> {
    let (controller, scheduler) = harness()?;
    let mut stream = controller.events().subscribe(None);
    controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Resume,
    );
    controller.schedule_finalize(
        Duration::from_millis(750),
        RecoveryGateOutcome::Applied { action: None },
        RecoveryOutcome::AutoRecovered,
    );

    let deadline = std::iter::from_fn(|| stream.try_next()).find_map(|envelope| {
        match envelope.event {
            Event::AutoCloseScheduled { close_at_ms, .. } => Some(close_at_ms),
            _ => None,
        }
    });
    assert_eq!(deadline, Some(scheduler.now_ms() + 750));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stale_action_results_are_discarded() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::Verify,
    );
    controller.request_recovery(
        TorrentFixture::missing("b", "fp-b").build(),
        RecoveryAction::Locate,
    );
    let (_, token) = controller
        .session_token()
        .ok_or_else(|| anyhow::anyhow!("expected active session"))?;

    let client = MockClient::new().with_delay(Duration::from_secs(10));
    let runner = controller.clone();
    let task = tokio::spawn(async move { runner.run_active_action(&client).await });
    tokio::task::yield_now().await;
    assert!(controller.state().is_busy);

    controller.finalize(RecoveryGateOutcome::Cancelled);
    assert!(token.is_cancelled());
    assert_eq!(task.await?, None);

    let session = controller
        .active_session()
        .ok_or_else(|| anyhow::anyhow!("expected promotion"))?;
    assert_eq!(session.torrent.id, "b");
    assert!(matches!(
        session.outcome,
        RecoveryOutcome::NeedsUserDecision { .. }
    ));
    assert!(!controller.state().is_busy);
    assert_eq!(controller.metrics().snapshot().stale_results_total, 1);
    Ok(())
}

#[tokio::test]
async fn relocate_active_verifies_new_location() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    controller.request_recovery(
        TorrentFixture::missing("a", "fp-a").build(),
        RecoveryAction::SetLocation,
    );
    let client = MockClient::new();

    let outcome = controller
        .relocate_active(&client, "/mnt/new", false)
        .await;
    assert_eq!(
        outcome,
        Some(RecoveryOutcome::AutoInProgress {
            detail: AutoDetail::Verify
        })
    );
    assert_eq!(
        controller.active_session().map(|session| session.outcome),
        outcome
    );
    Ok(())
}

#[tokio::test]
async fn running_without_a_session_is_a_no_op() -> anyhow::Result<()> {
    let (controller, _) = harness()?;
    let client = MockClient::new();
    assert_eq!(controller.run_active_action(&client).await, None);
    assert!(client.calls().is_empty());
    Ok(())
}
