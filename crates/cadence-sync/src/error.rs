use std::time::Duration;

use thiserror::Error;

/// Errors from a remote content store.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (connection, TLS, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered with an unexpected HTTP status.
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// The remote answered with a body we could not interpret.
    #[error("Invalid remote content: {0}")]
    Content(String),

    /// A conditional write found a different current revision.
    #[error("Revision conflict")]
    Conflict,
}

/// Errors from the sync engine.  A failed pull or push never leaves
/// partially applied local state behind.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Fetching the shared snapshot failed; local state is untouched.
    #[error("Sync failed: {0}")]
    Fetch(RemoteError),

    /// Committing the local snapshot failed; local state and the dirty
    /// flag are untouched and the caller may retry.
    #[error("Commit failed: {0}")]
    Commit(RemoteError),

    /// The remote operation exceeded its time budget.
    #[error("Remote operation timed out after {0:?}")]
    Timeout(Duration),

    /// The shared snapshot did not round-trip through JSON.
    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
