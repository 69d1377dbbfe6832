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

//! Recovery policy configuration documents.
//!
//! Layout: `model.rs` (typed policy and execution model), `validate.rs`
//! (field parsing helpers), `defaults.rs` (default values and bounds),
//! `error.rs` (typed errors).

mod defaults;
pub mod error;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{ExecutionModel, RecoveryConfig};
