//! # cadence-sync
//!
//! Synchronization of the client-local tracker state against the shared
//! remote snapshot.  The remote side is abstracted as a [`ContentStore`]
//! (whole-document get/put with revision tags); the [`SyncEngine`] pulls
//! the shared snapshot and merges it into local state under a
//! last-writer-wins timestamp gate, or pushes the local state out as the
//! new shared snapshot.

pub mod engine;
pub mod github;
pub mod merge;
pub mod remote;

mod error;

pub use engine::{CommitReceipt, MergeOutcome, SyncConfig, SyncEngine};
pub use error::{RemoteError, SyncError};
pub use github::{GithubConfig, GithubContentStore};
pub use remote::{ContentStore, MemoryContentStore, RevisionTag};
