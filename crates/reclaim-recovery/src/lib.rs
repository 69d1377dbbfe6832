#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Missing-files recovery: classification, action running, and the
//! single-session queue controller that reconciles against daemon snapshots.
//!
//! Layout: `classify.rs` (pure classifier and manual overrides), `runner.rs`
//! (adapter-backed recovery actions), `scheduler.rs` (timer abstraction),
//! `controller/` (queue, session and pause-ownership ledger), `reconcile.rs`
//! (snapshot reconciliation), `driver.rs` (polling task), `outcome.rs`
//! (terminal and intermediate outcomes), `error.rs` (typed errors).

pub mod classify;
pub mod controller;
pub mod driver;
pub mod error;
pub mod outcome;
pub mod reconcile;
pub mod runner;
pub mod scheduler;

pub use classify::{
    ClassificationOverride, ClassificationOverrides, ClassifyContext, Confidence, Escalation,
    MissingFilesClassification, classify,
};
pub use controller::{
    PauseLedger, PauseOwner, QueuedRecoverySummary, RecoveryCompletion, RecoveryController,
    RecoveryQueueEntry, RecoverySession, RecoveryViewState, SessionId,
};
pub use driver::spawn_reconciler;
pub use error::{RecoveryError, RecoveryResult};
pub use outcome::{AutoDetail, BlockReason, DecisionReason, RecoveryGateOutcome, RecoveryOutcome};
pub use reconcile::ReconcileReport;
pub use runner::{FsErrorKind, ProbeKind, RecoveryRunner, classify_fs_error};
pub use scheduler::{ManualScheduler, Scheduler, TimerCallback, TimerHandle, TokioScheduler};
