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

//! Daemon-agnostic torrent snapshot types and the adapter seam used by recovery.
//!
//! Layout: `model/` (snapshot DTOs and error envelopes), `fingerprint.rs`
//! (recovery identity keys), `service/` (daemon adapter traits), `error.rs`
//! (adapter error type).

pub mod error;
pub mod fingerprint;
pub mod model;
pub mod service;

pub use error::{ClientError, ClientResult};
pub use fingerprint::{Fingerprint, UNKNOWN_FINGERPRINT};
pub use model::{
    ErrorClass, ErrorEnvelope, FreeSpace, MissingFilesKind, RecoveryAction, RecoveryState,
    TorrentSnapshot, TorrentState,
};
pub use service::{ClientCapabilities, RecoveryClient, TorrentInspector};
