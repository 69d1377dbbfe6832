//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges the recovery controller updates.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    sessions_started_total: IntCounter,
    sessions_finalized_total: IntCounterVec,
    duplicate_requests_total: IntCounter,
    stale_results_total: IntCounter,
    ownership_pruned_total: IntCounter,
    queue_depth: IntGauge,
}

/// Snapshot of the recovery counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Sessions that became active.
    pub sessions_started_total: u64,
    /// Requests short-circuited onto an existing completion.
    pub duplicate_requests_total: u64,
    /// Async results discarded because their session was gone.
    pub stale_results_total: u64,
    /// Ledger entries dropped for torrents the daemon no longer reports.
    pub ownership_pruned_total: u64,
    /// Requests waiting behind the active session.
    pub queue_depth: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Recovery events emitted by type",
            &["type"],
        )?;
        let sessions_started_total = counter(
            "recovery_sessions_started_total",
            "Recovery sessions that became active",
        )?;
        let sessions_finalized_total = counter_vec(
            "recovery_sessions_finalized_total",
            "Recovery requests resolved by terminal status",
            &["status"],
        )?;
        let duplicate_requests_total = counter(
            "recovery_duplicate_requests_total",
            "Recovery requests merged into an existing session or queue entry",
        )?;
        let stale_results_total = counter(
            "recovery_stale_results_total",
            "Recovery action results discarded after their session ended",
        )?;
        let ownership_pruned_total = counter(
            "recovery_ownership_pruned_total",
            "Pause-ownership records pruned for removed torrents",
        )?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "recovery_queue_depth",
            "Recovery requests waiting behind the active session",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "recovery_queue_depth",
            source,
        })?;

        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(
            &registry,
            "recovery_sessions_started_total",
            &sessions_started_total,
        )?;
        register(
            &registry,
            "recovery_sessions_finalized_total",
            &sessions_finalized_total,
        )?;
        register(
            &registry,
            "recovery_duplicate_requests_total",
            &duplicate_requests_total,
        )?;
        register(
            &registry,
            "recovery_stale_results_total",
            &stale_results_total,
        )?;
        register(
            &registry,
            "recovery_ownership_pruned_total",
            &ownership_pruned_total,
        )?;
        register(&registry, "recovery_queue_depth", &queue_depth)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                sessions_started_total,
                sessions_finalized_total,
                duplicate_requests_total,
                stale_results_total,
                ownership_pruned_total,
                queue_depth,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Count a session becoming active.
    pub fn inc_session_started(&self) {
        self.inner.sessions_started_total.inc();
    }

    /// Count a request resolved with `status`.
    pub fn inc_session_finalized(&self, status: &str) {
        self.inner
            .sessions_finalized_total
            .with_label_values(&[status])
            .inc();
    }

    /// Count a request merged into an existing completion.
    pub fn inc_duplicate_request(&self) {
        self.inner.duplicate_requests_total.inc();
    }

    /// Count a discarded stale action result.
    pub fn inc_stale_result(&self) {
        self.inner.stale_results_total.inc();
    }

    /// Count pruned ledger entries.
    pub fn add_ownership_pruned(&self, count: usize) {
        self.inner
            .ownership_pruned_total
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Set the queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.inner
            .queue_depth
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Resolved count for a terminal status label.
    #[must_use]
    pub fn finalized_count(&self, status: &str) -> u64 {
        self.inner
            .sessions_finalized_total
            .with_label_values(&[status])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the recovery counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started_total: self.inner.sessions_started_total.get(),
            duplicate_requests_total: self.inner.duplicate_requests_total.get(),
            stale_results_total: self.inner.stale_results_total.get(),
            ownership_pruned_total: self.inner.ownership_pruned_total.get(),
            queue_depth: self.inner.queue_depth.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_event("session_started");
        metrics.inc_session_started();
        metrics.inc_session_finalized("cancelled");
        metrics.inc_session_finalized("cancelled");
        metrics.inc_duplicate_request();
        metrics.inc_stale_result();
        metrics.add_ownership_pruned(3);
        metrics.set_queue_depth(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions_started_total, 1);
        assert_eq!(snapshot.duplicate_requests_total, 1);
        assert_eq!(snapshot.stale_results_total, 1);
        assert_eq!(snapshot.ownership_pruned_total, 3);
        assert_eq!(snapshot.queue_depth, 2);
        assert_eq!(metrics.finalized_count("cancelled"), 2);
        assert_eq!(metrics.finalized_count("applied"), 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("recovery_sessions_finalized_total"));
        assert!(rendered.contains("recovery_queue_depth"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_session_started();
        assert_eq!(second.snapshot().sessions_started_total, 0);
        Ok(())
    }
}
