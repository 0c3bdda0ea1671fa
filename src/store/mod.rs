//! Durable local persistence for the tracking pipeline.
//!
//! Two keyed records survive process restarts:
//!
//! - The **session state** ([`SessionState`]) - device identifier plus the
//!   last-flush baseline, created at start and cleared at stop.
//! - The **durable local queue** ([`LocationQueue`]) - positions buffered
//!   while a batching threshold has not yet been reached, read and cleared
//!   together when the uploader drains it.
//!
//! Both are injected as traits; there are no process-wide singletons. The
//! file-backed implementations keep one JSON document per record behind an
//! internal mutex; the in-memory implementations back tests and embeddings
//! that do not need durability.

mod queue;
mod session;

pub use queue::{FileLocationQueue, LocationQueue, MemoryLocationQueue};
pub use session::{FileSessionStore, MemorySessionStore, SessionState, SessionStateStore};

use thiserror::Error;

/// Errors from the durable local stores.
///
/// Store failures are non-fatal to a tracking session: they are converted
/// to failure events upstream and the affected samples are considered lost.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O failed: {0}")]
    Io(String),

    /// Encoding or decoding a persisted record failed.
    #[error("Store serialization failed: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
