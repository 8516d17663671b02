//! The remote content-store abstraction consumed by the sync engine.
//!
//! The remote side only has to offer "get current content" and "write new
//! content" by path.  Revisions tag each stored version so a conditional
//! write can be layered on later; today the engine writes unconditionally
//! (last writer wins at the storage layer).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::RemoteError;

/// Opaque version tag of a stored document (a git blob SHA, a content
/// hash, a counter, ...).
pub type RevisionTag = String;

/// Whole-document storage by path.
pub trait ContentStore {
    /// Fetch the current content at `path`, or `None` if nothing has
    /// been published there yet.
    fn get(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<(Vec<u8>, RevisionTag)>, RemoteError>> + Send;

    /// Replace the content at `path`.  When `previous` is given the
    /// write must fail with [`RemoteError::Conflict`] unless it matches
    /// the current revision.
    fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        previous: Option<&str>,
    ) -> impl Future<Output = Result<RevisionTag, RemoteError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, (Vec<u8>, u64)>,
    next_revision: u64,
    fail_gets: bool,
    fail_puts: bool,
    delay: Option<Duration>,
}

/// In-memory [`ContentStore`].  Clones share the same storage, so a test
/// can keep a handle to seed or inspect content while the engine owns
/// another.  Optional failure and latency injection for exercising the
/// engine's error paths.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `get` calls fail with a transport error.
    pub fn set_fail_gets(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_gets = fail;
    }

    /// Make subsequent `put` calls fail with a transport error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.inner.lock().expect("memory store lock").fail_puts = fail;
    }

    /// Delay every operation, for timeout and cancellation tests.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().expect("memory store lock").delay = Some(delay);
    }

    fn delay(&self) -> Option<Duration> {
        self.inner.lock().expect("memory store lock").delay
    }
}

impl ContentStore for MemoryContentStore {
    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, RevisionTag)>, RemoteError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }
        let inner = self.inner.lock().expect("memory store lock");
        if inner.fail_gets {
            return Err(RemoteError::Transport("injected failure".to_string()));
        }
        Ok(inner
            .entries
            .get(path)
            .map(|(content, rev)| (content.clone(), format!("m{rev}"))))
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        previous: Option<&str>,
    ) -> Result<RevisionTag, RemoteError> {
        if let Some(delay) = self.delay() {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().expect("memory store lock");
        if inner.fail_puts {
            return Err(RemoteError::Transport("injected failure".to_string()));
        }
        if let Some(expected) = previous {
            let current = inner.entries.get(path).map(|(_, rev)| format!("m{rev}"));
            if current.as_deref() != Some(expected) {
                return Err(RemoteError::Conflict);
            }
        }
        inner.next_revision += 1;
        let revision = inner.next_revision;
        inner.entries.insert(path.to_string(), (content, revision));
        Ok(format!("m{revision}"))
    }
}
