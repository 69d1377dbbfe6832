//! Recovery queue and session controller.
//!
//! # Design
//! - One active session slot plus a FIFO overflow queue; requests for a
//!   fingerprint that is already active or queued share its completion.
//! - All state lives behind one mutex and every operation runs to completion
//!   under it, so promotion after finalize cannot race.
//! - Each session owns a fresh [`CancellationToken`]; finalizing cancels it so
//!   in-flight adapter calls started for that session are discarded.
//! - At most one auto-close timer exists. Its callback carries the session id
//!   it was armed for and is ignored once that session is gone.

mod entry;
mod ledger;
mod view;

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reclaim_config::RecoveryConfig;
use reclaim_events::{Event, EventBus};
use reclaim_telemetry::Metrics;
use reclaim_torrent_core::{Fingerprint, RecoveryAction, RecoveryClient, TorrentSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use entry::{RecoveryCompletion, RecoveryQueueEntry};
pub use ledger::{PauseLedger, PauseOwner};
pub use view::{QueuedRecoverySummary, RecoverySession, RecoveryViewState, SessionId};

use self::entry::CompletionResolver;
use crate::classify::{
    ClassificationOverride, ClassificationOverrides, ClassifyContext, MissingFilesClassification,
    classify,
};
use crate::error::{RecoveryError, RecoveryResult};
use crate::outcome::{AutoDetail, RecoveryGateOutcome, RecoveryOutcome};
use crate::runner::{RecoveryRunner, decision_for};
use crate::scheduler::{Scheduler, TimerCallback, TimerHandle, duration_millis};

pub(crate) struct ActiveSession {
    pub(crate) session: RecoverySession,
    completion: RecoveryCompletion,
    resolver: CompletionResolver,
    token: CancellationToken,
    in_flight: bool,
}

struct ArmedTimer {
    session_id: SessionId,
    handle: TimerHandle,
}

#[derive(Default)]
pub(crate) struct ControllerState {
    pub(crate) active: Option<ActiveSession>,
    pub(crate) pending: VecDeque<RecoveryQueueEntry>,
    timer: Option<ArmedTimer>,
    pub(crate) ledger: PauseLedger,
    pub(crate) overrides: ClassificationOverrides,
    pub(crate) detail: Option<TorrentSnapshot>,
    last_session_id: u64,
}

impl ControllerState {
    fn consistency(&self) -> RecoveryResult<()> {
        let active = self.active.as_ref().map(|active| &active.session);
        if active.is_none() && !self.pending.is_empty() {
            return Err(RecoveryError::InvariantViolation {
                invariant: "queue_requires_active_session",
            });
        }
        let mut seen = HashSet::new();
        for entry in &self.pending {
            if active.is_some_and(|session| session.fingerprint == entry.fingerprint) {
                return Err(RecoveryError::InvariantViolation {
                    invariant: "queued_fingerprint_is_active",
                });
            }
            if !seen.insert(&entry.fingerprint) {
                return Err(RecoveryError::InvariantViolation {
                    invariant: "queued_fingerprint_is_unique",
                });
            }
        }
        if let Some(timer) = &self.timer
            && active.is_none_or(|session| session.id != timer.session_id)
        {
            return Err(RecoveryError::InvariantViolation {
                invariant: "timer_targets_active_session",
            });
        }
        Ok(())
    }

    fn detail_blocked(&self) -> bool {
        match (&self.active, &self.detail) {
            (Some(active), Some(detail)) => Fingerprint::of(detail) != active.session.fingerprint,
            _ => false,
        }
    }
}

struct Shared {
    state: Mutex<ControllerState>,
    scheduler: Arc<dyn Scheduler>,
    events: EventBus,
    metrics: Metrics,
    config: RecoveryConfig,
}

/// Owns the active recovery session, the pending queue and the pause ledger.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct RecoveryController {
    shared: Arc<Shared>,
}

impl RecoveryController {
    /// Build a controller with an empty queue and ledger.
    #[must_use]
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        events: EventBus,
        metrics: Metrics,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                scheduler,
                events,
                metrics,
                config,
            }),
        }
    }

    /// Policy the controller was built with.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.shared.config
    }

    /// Bus receiving lifecycle events.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Metrics updated on each transition.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: Event) {
        self.shared.metrics.inc_event(event.kind());
        self.shared.events.publish(event);
    }

    pub(crate) fn check(state: &ControllerState) {
        debug_assert!(
            state.consistency().is_ok(),
            "recovery controller invariant violated: {:?}",
            state.consistency()
        );
    }

    /// Verify queue, session and timer bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::InvariantViolation`] naming the first broken invariant.
    pub fn debug_assert_consistent(&self) -> RecoveryResult<()> {
        self.lock().consistency()
    }

    /// Classify `torrent` using the stored overrides and configured execution model.
    ///
    /// An override keyed by the torrent id wins over one keyed by its hash.
    #[must_use]
    pub fn classify(&self, torrent: &TorrentSnapshot) -> MissingFilesClassification {
        let state = self.lock();
        let key = std::iter::once(torrent.id.as_str())
            .chain(torrent.hash.as_deref())
            .find(|key| state.overrides.get(key).is_some())
            .unwrap_or(torrent.id.as_str());
        classify(
            torrent.error_envelope.as_ref(),
            torrent.download_dir.as_deref(),
            &ClassifyContext {
                torrent_id: Some(key),
                execution_model: self.shared.config.execution_model,
                overrides: Some(&state.overrides),
            },
        )
    }

    /// Store a manual classification for a torrent id or info hash.
    pub fn set_classification_override(
        &self,
        key: impl Into<String>,
        value: ClassificationOverride,
    ) {
        self.lock().overrides.set(key, value);
    }

    /// Remove a manual classification. Returns whether one existed.
    pub fn clear_classification_override(&self, key: &str) -> bool {
        self.lock().overrides.clear(key)
    }

    /// Queue `entry`, starting it at once when no session is active.
    ///
    /// A request for a fingerprint that is already active or queued returns
    /// that request's completion and `entry` is discarded.
    pub fn enqueue(&self, entry: RecoveryQueueEntry) -> RecoveryCompletion {
        let mut state = self.lock();
        let existing = state
            .active
            .as_ref()
            .filter(|active| active.session.fingerprint == entry.fingerprint)
            .map(|active| active.completion.clone())
            .or_else(|| {
                state
                    .pending
                    .iter()
                    .find(|queued| queued.fingerprint == entry.fingerprint)
                    .map(RecoveryQueueEntry::completion)
            });
        if let Some(existing) = existing {
            self.shared.metrics.inc_duplicate_request();
            debug!(fingerprint = %entry.fingerprint, "recovery already requested; sharing completion");
            return existing;
        }

        let completion = entry.completion();
        if state.active.is_none() {
            self.start_locked(&mut state, entry);
        } else {
            info!(
                fingerprint = %entry.fingerprint,
                torrent_id = %entry.torrent.id,
                action = ?entry.action,
                position = state.pending.len() + 1,
                "recovery queued behind active session"
            );
            state.pending.push_back(entry);
            self.queue_changed(&state);
        }
        Self::check(&state);
        completion
    }

    /// Classify `torrent`, build an entry for `action` and enqueue it.
    pub fn request_recovery(
        &self,
        torrent: TorrentSnapshot,
        action: RecoveryAction,
    ) -> RecoveryCompletion {
        let classification = self.classify(&torrent);
        let fingerprint = Fingerprint::of(&torrent);
        let outcome = initial_outcome(action, &torrent);
        let requires_decision = matches!(
            action,
            RecoveryAction::Locate
                | RecoveryAction::ChooseLocation
                | RecoveryAction::SetLocation
                | RecoveryAction::OpenFolder
        );
        self.enqueue(
            RecoveryQueueEntry::new(torrent, action, outcome, classification, fingerprint)
                .with_requires_decision(requires_decision),
        )
    }

    /// Resolve the active session with `result` and promote the next queued entry.
    ///
    /// Returns `false` when no session is active.
    pub fn finalize(&self, result: RecoveryGateOutcome) -> bool {
        let mut state = self.lock();
        let finalized = self.finalize_locked(&mut state, result);
        Self::check(&state);
        finalized
    }

    /// Like [`RecoveryController::finalize`], but only while `session_id` is still active.
    pub fn finalize_session(&self, session_id: SessionId, result: RecoveryGateOutcome) -> bool {
        let mut state = self.lock();
        let current = state
            .active
            .as_ref()
            .is_some_and(|active| active.session.id == session_id);
        if !current {
            debug!(session_id = %session_id, "finalize ignored for inactive session");
            return false;
        }
        let finalized = self.finalize_locked(&mut state, result);
        Self::check(&state);
        finalized
    }

    /// Show `outcome` on the active session and finalize it with `result` after `delay`.
    ///
    /// Replaces any previously armed auto-close timer. Returns `false` when no
    /// session is active or `delay` is zero.
    pub fn schedule_finalize(
        &self,
        delay: Duration,
        result: RecoveryGateOutcome,
        outcome: RecoveryOutcome,
    ) -> bool {
        let mut state = self.lock();
        let scheduled = self.schedule_finalize_locked(&mut state, delay, result, outcome);
        Self::check(&state);
        scheduled
    }

    /// Resolve queued requests for `fingerprint` with `result` and finalize the
    /// active session when it belongs to `fingerprint`.
    ///
    /// Returns whether anything was resolved.
    pub fn cancel_for_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        result: RecoveryGateOutcome,
    ) -> bool {
        let mut state = self.lock();
        let removed =
            self.resolve_pending_where(&mut state, result, |entry| entry.fingerprint == *fingerprint);
        let active = state
            .active
            .as_ref()
            .is_some_and(|active| active.session.fingerprint == *fingerprint);
        if active {
            self.finalize_locked(&mut state, result);
        }
        Self::check(&state);
        !removed.is_empty() || active
    }

    /// Resolve every queued request with `result`, leaving the active session alone.
    ///
    /// Returns how many requests were resolved.
    pub fn cancel_pending_recovery_queue(&self, result: RecoveryGateOutcome) -> usize {
        let mut state = self.lock();
        let removed = self.resolve_pending_where(&mut state, result, |_| true);
        Self::check(&state);
        removed.len()
    }

    /// Run the active session's action through `client`.
    ///
    /// The result is discarded when the session is finalized or replaced while
    /// the action runs. An auto-recovered result arms auto-close with the
    /// configured delay.
    pub async fn run_active_action(&self, client: &dyn RecoveryClient) -> Option<RecoveryOutcome> {
        let runner = RecoveryRunner::new(client);
        self.drive_active(|torrent, action| async move { runner.run(action, &torrent).await })
            .await
    }

    /// Move the active session's torrent to `path` through `client`.
    pub async fn relocate_active(
        &self,
        client: &dyn RecoveryClient,
        path: &str,
        move_data: bool,
    ) -> Option<RecoveryOutcome> {
        let runner = RecoveryRunner::new(client);
        self.drive_active(|torrent, _| async move {
            runner.relocate(&torrent, path, move_data).await
        })
        .await
    }

    /// Id and cancellation signal of the active session.
    ///
    /// Callers running their own long actions must stop applying results once
    /// the token is cancelled.
    #[must_use]
    pub fn session_token(&self) -> Option<(SessionId, CancellationToken)> {
        self.lock()
            .active
            .as_ref()
            .map(|active| (active.session.id, active.token.clone()))
    }

    /// Record that recovery paused the torrent.
    pub fn mark_paused_by_system(&self, fingerprint: &Fingerprint) {
        debug!(fingerprint = %fingerprint, "paused by recovery");
        self.lock().ledger.mark_paused_by_system(fingerprint);
    }

    /// Record that the user paused the torrent.
    pub fn mark_paused_by_user(&self, fingerprint: &Fingerprint) {
        debug!(fingerprint = %fingerprint, "paused by user");
        self.lock().ledger.mark_paused_by_user(fingerprint);
    }

    /// Record that recovery for the torrent was cancelled.
    pub fn mark_cancelled(&self, fingerprint: &Fingerprint) {
        self.lock().ledger.mark_cancelled(fingerprint);
    }

    /// Forget pause ownership and cancellation for the torrent.
    pub fn mark_resumed(&self, fingerprint: &Fingerprint) {
        self.lock().ledger.mark_resumed(fingerprint);
    }

    /// Whether recovery may be retried automatically for `fingerprint`.
    #[must_use]
    pub fn is_background_recovery_eligible(&self, fingerprint: &Fingerprint) -> bool {
        self.lock()
            .ledger
            .is_background_recovery_eligible(fingerprint)
    }

    /// Whether recovery for `fingerprint` was cancelled.
    #[must_use]
    pub fn is_recovery_cancelled(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().ledger.is_cancelled(fingerprint)
    }

    /// Who paused the torrent, if anyone.
    #[must_use]
    pub fn pause_owner(&self, fingerprint: &Fingerprint) -> Option<PauseOwner> {
        self.lock().ledger.owner(fingerprint)
    }

    /// Record the torrent shown in the detail view.
    pub fn set_detail_torrent(&self, torrent: Option<TorrentSnapshot>) {
        self.lock().detail = torrent;
    }

    /// Whether the detail view shows a torrent other than the one being recovered.
    #[must_use]
    pub fn is_detail_recovery_blocked(&self) -> bool {
        self.lock().detail_blocked()
    }

    /// Active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<RecoverySession> {
        self.lock()
            .active
            .as_ref()
            .map(|active| active.session.clone())
    }

    /// Number of queued requests.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Snapshot of the controller for rendering.
    #[must_use]
    pub fn state(&self) -> RecoveryViewState {
        let state = self.lock();
        RecoveryViewState {
            session: state.active.as_ref().map(|active| active.session.clone()),
            is_busy: state.active.as_ref().is_some_and(|active| active.in_flight),
            is_detail_recovery_blocked: state.detail_blocked(),
            queued_count: state.pending.len(),
            queued_items: state
                .pending
                .iter()
                .map(QueuedRecoverySummary::from_entry)
                .collect(),
        }
    }

    fn start_locked(&self, state: &mut ControllerState, entry: RecoveryQueueEntry) {
        state.last_session_id += 1;
        let id = SessionId::new(state.last_session_id);
        let RecoveryQueueEntry {
            torrent,
            action,
            outcome,
            classification,
            fingerprint,
            requires_decision,
            completion,
            resolver,
        } = entry;

        info!(
            session_id = %id,
            fingerprint = %fingerprint,
            torrent_id = %torrent.id,
            action = ?action,
            "recovery session started"
        );
        let event = Event::SessionStarted {
            session_id: id.get(),
            fingerprint: fingerprint.to_string(),
            torrent_id: torrent.id.clone(),
            action: action.as_str().to_string(),
        };
        state.active = Some(ActiveSession {
            session: RecoverySession {
                id,
                torrent,
                action,
                outcome,
                classification,
                fingerprint,
                requires_decision,
                auto_close_at_ms: None,
            },
            completion,
            resolver,
            token: CancellationToken::new(),
            in_flight: false,
        });
        self.shared.metrics.inc_session_started();
        self.emit(event);
    }

    pub(crate) fn finalize_locked(
        &self,
        state: &mut ControllerState,
        result: RecoveryGateOutcome,
    ) -> bool {
        let Some(active) = state.active.take() else {
            return false;
        };
        if let Some(timer) = state.timer.take() {
            timer.handle.cancel();
        }
        active.token.cancel();

        let fingerprint = active.session.fingerprint;
        if !active.resolver.resolve(result) {
            debug!(fingerprint = %fingerprint, "completion was already resolved");
        }
        if result.is_cancelled() {
            state.ledger.mark_cancelled(&fingerprint);
        }
        info!(
            session_id = %active.session.id,
            fingerprint = %fingerprint,
            status = result.status(),
            "recovery session finalized"
        );
        self.record_resolution(&fingerprint, result);

        if let Some(next) = state.pending.pop_front() {
            self.start_locked(state, next);
            self.queue_changed(state);
        }
        true
    }

    fn schedule_finalize_locked(
        &self,
        state: &mut ControllerState,
        delay: Duration,
        result: RecoveryGateOutcome,
        outcome: RecoveryOutcome,
    ) -> bool {
        if delay.is_zero() {
            return false;
        }
        let now = self.shared.scheduler.now_ms();
        let Some(active) = state.active.as_mut() else {
            return false;
        };
        let close_at_ms = now.saturating_add(duration_millis(delay));
        active.session.outcome = outcome;
        active.session.auto_close_at_ms = Some(close_at_ms);
        let session_id = active.session.id;
        let fingerprint = active.session.fingerprint.to_string();
        let label = active.session.outcome.label();

        if let Some(previous) = state.timer.take() {
            debug!(session_id = %previous.session_id, "replacing pending auto-close");
            previous.handle.cancel();
        }
        let controller = Arc::downgrade(&self.shared);
        let callback: TimerCallback = Box::new(move || {
            if let Some(shared) = controller.upgrade() {
                Self { shared }.fire_auto_close(session_id, result);
            }
        });
        let handle = self.shared.scheduler.schedule_timeout(delay, callback);
        state.timer = Some(ArmedTimer { session_id, handle });

        info!(
            session_id = %session_id,
            fingerprint = %fingerprint,
            delay_ms = duration_millis(delay),
            "auto-close armed"
        );
        self.emit(Event::SessionOutcomeChanged {
            session_id: session_id.get(),
            fingerprint: fingerprint.clone(),
            outcome: label.to_string(),
        });
        self.emit(Event::AutoCloseScheduled {
            session_id: session_id.get(),
            fingerprint,
            close_at_ms,
        });
        true
    }

    fn fire_auto_close(&self, session_id: SessionId, result: RecoveryGateOutcome) {
        let mut state = self.lock();
        let armed = state
            .timer
            .as_ref()
            .is_some_and(|timer| timer.session_id == session_id);
        let current = state
            .active
            .as_ref()
            .is_some_and(|active| active.session.id == session_id);
        if !(armed && current) {
            debug!(session_id = %session_id, "ignoring auto-close for a replaced session");
            return;
        }
        state.timer = None;
        info!(session_id = %session_id, "auto-close fired");
        self.finalize_locked(&mut state, result);
        Self::check(&state);
    }

    /// Resolve and remove queued entries matching `predicate`; returns their fingerprints.
    pub(crate) fn resolve_pending_where(
        &self,
        state: &mut ControllerState,
        result: RecoveryGateOutcome,
        predicate: impl Fn(&RecoveryQueueEntry) -> bool,
    ) -> Vec<Fingerprint> {
        let (matched, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(predicate);
        state.pending = kept;

        let mut removed = Vec::with_capacity(matched.len());
        for entry in matched {
            entry.resolver.resolve(result);
            if result.is_cancelled() {
                state.ledger.mark_cancelled(&entry.fingerprint);
            }
            debug!(fingerprint = %entry.fingerprint, status = result.status(), "queued recovery resolved");
            self.record_resolution(&entry.fingerprint, result);
            removed.push(entry.fingerprint);
        }
        if !removed.is_empty() {
            self.queue_changed(state);
        }
        removed
    }

    fn record_resolution(&self, fingerprint: &Fingerprint, result: RecoveryGateOutcome) {
        self.shared.metrics.inc_session_finalized(result.status());
        self.emit(Event::SessionFinalized {
            fingerprint: fingerprint.to_string(),
            status: result.status().to_string(),
        });
    }

    pub(crate) fn queue_changed(&self, state: &ControllerState) {
        self.shared.metrics.set_queue_depth(state.pending.len());
        self.emit(Event::QueueChanged {
            queued: state.pending.len(),
        });
    }

    async fn drive_active<F, Fut>(&self, work: F) -> Option<RecoveryOutcome>
    where
        F: FnOnce(TorrentSnapshot, RecoveryAction) -> Fut,
        Fut: Future<Output = RecoveryOutcome>,
    {
        let (session_id, torrent, action, token) = {
            let mut state = self.lock();
            let active = state.active.as_mut()?;
            active.in_flight = true;
            (
                active.session.id,
                active.session.torrent.clone(),
                active.session.action,
                active.token.clone(),
            )
        };

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            outcome = work(torrent, action) => Some(outcome),
        };
        self.apply_action_result(session_id, action, outcome)
    }

    fn apply_action_result(
        &self,
        session_id: SessionId,
        action: RecoveryAction,
        outcome: Option<RecoveryOutcome>,
    ) -> Option<RecoveryOutcome> {
        let mut state = self.lock();
        let active = state
            .active
            .as_mut()
            .filter(|active| active.session.id == session_id && !active.token.is_cancelled());
        let (Some(active), Some(outcome)) = (active, outcome) else {
            self.shared.metrics.inc_stale_result();
            info!(session_id = %session_id, action = ?action, "discarding stale recovery result");
            return None;
        };

        active.in_flight = false;
        active.session.outcome = outcome.clone();
        let fingerprint = active.session.fingerprint.to_string();
        debug!(session_id = %session_id, outcome = outcome.label(), "recovery action finished");

        if outcome == RecoveryOutcome::AutoRecovered {
            let delay = self.shared.config.auto_close_delay();
            let result = RecoveryGateOutcome::Applied {
                action: Some(action),
            };
            self.schedule_finalize_locked(&mut state, delay, result, outcome.clone());
        } else {
            self.emit(Event::SessionOutcomeChanged {
                session_id: session_id.get(),
                fingerprint,
                outcome: outcome.label().to_string(),
            });
        }
        Self::check(&state);
        Some(outcome)
    }
}

fn initial_outcome(action: RecoveryAction, torrent: &TorrentSnapshot) -> RecoveryOutcome {
    match action {
        RecoveryAction::Verify => RecoveryOutcome::AutoInProgress {
            detail: AutoDetail::Verify,
        },
        RecoveryAction::Reannounce => RecoveryOutcome::AutoInProgress {
            detail: AutoDetail::Reannounce,
        },
        _ => decision_for(torrent),
    }
}
