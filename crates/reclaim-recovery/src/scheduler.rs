//! Single-shot timer abstraction used for auto-close.
//!
//! # Design
//! - Callbacks never run synchronously inside `schedule_timeout`, so callers
//!   may arm timers while holding their own locks.
//! - [`ManualScheduler`] drives timers from an explicit clock for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;

/// Work run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Cancels a pending timer. Dropping the handle leaves the timer armed.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Handle that runs `cancel` when [`TimerHandle::cancel`] is called.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the timer. A timer that already fired is unaffected.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Clock and timer source for the recovery controller.
pub trait Scheduler: Send + Sync {
    /// Run `callback` once after `delay`. Must not invoke it before returning.
    fn schedule_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Current time in Unix milliseconds.
    fn now_ms(&self) -> i64;
}

/// Scheduler backed by tokio tasks and the wall clock.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Scheduler spawning timers on `handle`.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling context, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::new(move || task.abort())
    }

    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

type TimerKey = (i64, u64);

#[derive(Default)]
struct ManualClock {
    now_ms: i64,
    next_id: u64,
    timers: BTreeMap<TimerKey, TimerCallback>,
}

/// Scheduler whose clock only moves when [`ManualScheduler::advance`] is called.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    /// Scheduler starting at Unix millisecond `start_ms`.
    #[must_use]
    pub fn starting_at(start_ms: i64) -> Self {
        let scheduler = Self::default();
        scheduler.lock().now_ms = start_ms;
        scheduler
    }

    /// Move the clock forward by `delay`, firing due timers in deadline order.
    ///
    /// Callbacks run without the clock locked, so they may arm new timers;
    /// those fire in the same call when they fall due before the new time.
    pub fn advance(&self, delay: Duration) {
        let target = self.lock().now_ms.saturating_add(duration_millis(delay));
        loop {
            let due = {
                let mut clock = self.lock();
                let next = clock
                    .timers
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(deadline, _)| *deadline <= target);
                next.and_then(|key| {
                    clock.now_ms = key.0;
                    clock.timers.remove(&key)
                })
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.lock().now_ms = target;
    }

    /// Number of timers still armed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let key = {
            let mut clock = self.lock();
            let key = (clock.now_ms.saturating_add(duration_millis(delay)), clock.next_id);
            clock.next_id += 1;
            clock.timers.insert(key, callback);
            key
        };
        let clock: Weak<Mutex<ManualClock>> = Arc::downgrade(&self.clock);
        TimerHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                clock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .timers
                    .remove(&key);
            }
        })
    }

    fn now_ms(&self) -> i64 {
        self.lock().now_ms
    }
}

pub(crate) fn duration_millis(delay: Duration) -> i64 {
    i64::try_from(delay.as_millis()).unwrap_or(i64::MAX)
}
