//! The sync engine: pull-and-merge, push, and nothing in between.
//!
//! Within one client, `pull` and `push` are mutually exclusive: both
//! take `&mut self`, so the borrow checker serializes them; a merge
//! computed against a stale read can never be applied after a concurrent
//! push has moved `last_applied`.  Across clients there is no global
//! serialization: the monotonic `lastUpdated` comparison in `pull` is
//! the only ordering guarantee, and concurrent pushes race
//! last-writer-wins at the storage layer.
//!
//! Both operations bound their remote I/O with a timeout and are
//! cancellable by dropping the future: local state is only mutated after
//! the remote call has fully completed, so an abandoned call leaves
//! state exactly as it was.

use std::time::Duration;

use cadence_shared::constants::SNAPSHOT_PATH;
use cadence_shared::{Identity, SharedSnapshot};
use cadence_store::TrackerStore;
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::merge;
use crate::remote::{ContentStore, RevisionTag};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Path of the shared snapshot document in the remote store.
    pub path: String,
    pub pull_timeout: Duration,
    pub push_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            path: SNAPSHOT_PATH.to_string(),
            pull_timeout: Duration::from_secs(10),
            push_timeout: Duration::from_secs(15),
        }
    }
}

/// Outcome of a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing has ever been published to the remote store.
    NoRemoteData,
    /// The remote snapshot is not newer than what we already applied.
    AlreadyUpToDate,
    /// The remote snapshot was merged into local state.
    Merged,
}

/// Receipt of a successful push.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub revision: RevisionTag,
    pub last_updated: DateTime<Utc>,
}

/// Reconciles a [`TrackerStore`] against the shared remote snapshot.
pub struct SyncEngine<S> {
    remote: S,
    config: SyncConfig,
    last_applied: Option<DateTime<Utc>>,
}

impl<S: ContentStore> SyncEngine<S> {
    pub fn new(remote: S, config: SyncConfig) -> Self {
        Self {
            remote,
            config,
            last_applied: None,
        }
    }

    /// Timestamp of the last remote snapshot applied or pushed by this
    /// engine, if any.
    pub fn last_applied(&self) -> Option<DateTime<Utc>> {
        self.last_applied
    }

    /// Fetch the shared snapshot and merge it into local state.
    ///
    /// All-or-nothing: the merge is computed and applied only after the
    /// fetch has fully succeeded.  A failure, timeout, or cancellation
    /// leaves `tracker` untouched.
    pub async fn pull(&mut self, tracker: &mut TrackerStore) -> Result<MergeOutcome, SyncError> {
        let fetched = timeout(self.config.pull_timeout, self.remote.get(&self.config.path))
            .await
            .map_err(|_| SyncError::Timeout(self.config.pull_timeout))?
            .map_err(SyncError::Fetch)?;

        let Some((content, revision)) = fetched else {
            debug!("no shared snapshot published yet");
            return Ok(MergeOutcome::NoRemoteData);
        };

        let snapshot: SharedSnapshot = serde_json::from_slice(&content)?;

        if let Some(applied) = self.last_applied {
            if snapshot.last_updated <= applied {
                debug!(
                    remote = %snapshot.last_updated,
                    applied = %applied,
                    "remote snapshot is not newer; skipping merge"
                );
                return Ok(MergeOutcome::AlreadyUpToDate);
            }
        }

        let merged = merge::merge_snapshot(
            tracker.tasks(),
            tracker.cells(),
            tracker.change_log(),
            &snapshot,
        );
        tracker.apply_merged(merged.tasks, merged.cells, merged.change_log);
        self.last_applied = Some(snapshot.last_updated);

        info!(
            revision = %revision,
            last_updated = %snapshot.last_updated,
            committed_by = %snapshot.committed_by.email,
            "merged shared snapshot"
        );
        Ok(MergeOutcome::Merged)
    }

    /// Publish the local state as the new shared snapshot.
    ///
    /// No conditional write is performed: a concurrent push from another
    /// client is silently overwritten, later write winning.  On failure
    /// the local state and the dirty flag are untouched and the caller
    /// may retry.
    pub async fn push(
        &mut self,
        tracker: &mut TrackerStore,
        identity: &Identity,
    ) -> Result<CommitReceipt, SyncError> {
        let snapshot = tracker.to_snapshot(identity);
        let content = serde_json::to_vec_pretty(&snapshot)?;

        let revision = timeout(
            self.config.push_timeout,
            self.remote.put(&self.config.path, content, None),
        )
        .await
        .map_err(|_| SyncError::Timeout(self.config.push_timeout))?
        .map_err(SyncError::Commit)?;

        tracker.mark_clean();
        self.last_applied = Some(snapshot.last_updated);

        info!(
            revision = %revision,
            last_updated = %snapshot.last_updated,
            "pushed local snapshot"
        );
        Ok(CommitReceipt {
            revision,
            last_updated: snapshot.last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryContentStore;
    use cadence_shared::{Category, CellMap, Priority, SharedSnapshot, TaskRecord};
    use chrono::Duration as ChronoDuration;

    fn alice() -> Identity {
        Identity {
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
            role: None,
            is_admin: true,
        }
    }

    fn remote_snapshot(tasks: Vec<TaskRecord>, last_updated: DateTime<Utc>) -> SharedSnapshot {
        SharedSnapshot {
            tasks,
            cell_data: CellMap::new(),
            change_log: vec![],
            last_updated,
            committed_by: alice(),
        }
    }

    fn task(id: u64, name: &str) -> TaskRecord {
        TaskRecord {
            id,
            name: name.to_string(),
            category: Category::Roadmap,
            priority: Priority::Medium,
            delivery_date: None,
        }
    }

    async fn seed(store: &MemoryContentStore, snapshot: &SharedSnapshot) {
        store
            .put(
                SNAPSHOT_PATH,
                serde_json::to_vec(snapshot).unwrap(),
                None,
            )
            .await
            .unwrap();
    }

    fn engine(store: &MemoryContentStore) -> SyncEngine<MemoryContentStore> {
        SyncEngine::new(store.clone(), SyncConfig::default())
    }

    #[tokio::test]
    async fn pull_with_empty_remote() {
        let store = MemoryContentStore::new();
        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();

        let outcome = engine.pull(&mut tracker).await.unwrap();
        assert_eq!(outcome, MergeOutcome::NoRemoteData);
        assert_eq!(engine.last_applied(), None);
    }

    #[tokio::test]
    async fn pull_merges_and_is_then_up_to_date() {
        let store = MemoryContentStore::new();
        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();
        tracker.add_task("A", Category::Roadmap, Priority::Medium, &alice());

        let stamp = Utc::now();
        seed(&store, &remote_snapshot(vec![task(1, "B"), task(2, "C")], stamp)).await;

        assert_eq!(engine.pull(&mut tracker).await.unwrap(), MergeOutcome::Merged);
        let names: Vec<&str> = tracker.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(engine.last_applied(), Some(stamp));

        // Same remote again: no-op, no mutation.
        let before = tracker.tasks().to_vec();
        assert_eq!(
            engine.pull(&mut tracker).await.unwrap(),
            MergeOutcome::AlreadyUpToDate
        );
        assert_eq!(tracker.tasks(), before.as_slice());
        assert_eq!(engine.last_applied(), Some(stamp));
    }

    #[tokio::test]
    async fn pull_ignores_older_snapshots() {
        let store = MemoryContentStore::new();
        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();

        let newer = Utc::now();
        seed(&store, &remote_snapshot(vec![task(1, "new")], newer)).await;
        assert_eq!(engine.pull(&mut tracker).await.unwrap(), MergeOutcome::Merged);

        // A stale client now publishes an older snapshot.
        let older = newer - ChronoDuration::minutes(5);
        seed(&store, &remote_snapshot(vec![task(1, "stale")], older)).await;

        assert_eq!(
            engine.pull(&mut tracker).await.unwrap(),
            MergeOutcome::AlreadyUpToDate
        );
        assert_eq!(tracker.tasks()[0].name, "new");
        assert_eq!(engine.last_applied(), Some(newer));
    }

    #[tokio::test]
    async fn failed_pull_leaves_state_untouched() {
        let store = MemoryContentStore::new();
        seed(&store, &remote_snapshot(vec![task(1, "B")], Utc::now())).await;
        store.set_fail_gets(true);

        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();
        tracker.add_task("A", Category::Roadmap, Priority::Medium, &alice());
        let before = tracker.tasks().to_vec();

        assert!(matches!(
            engine.pull(&mut tracker).await.unwrap_err(),
            SyncError::Fetch(_)
        ));
        assert_eq!(tracker.tasks(), before.as_slice());
        assert_eq!(engine.last_applied(), None);
    }

    #[tokio::test]
    async fn push_publishes_and_clears_dirty() {
        let store = MemoryContentStore::new();
        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();
        tracker.add_task("A", Category::Roadmap, Priority::High, &alice());
        assert!(tracker.is_dirty());

        let receipt = engine.push(&mut tracker, &alice()).await.unwrap();
        assert!(!tracker.is_dirty());
        assert_eq!(engine.last_applied(), Some(receipt.last_updated));

        let (content, revision) = store.get(SNAPSHOT_PATH).await.unwrap().unwrap();
        assert_eq!(revision, receipt.revision);
        let published: SharedSnapshot = serde_json::from_slice(&content).unwrap();
        assert_eq!(published.tasks, tracker.tasks());
        assert_eq!(published.committed_by.email, "alice@example.com");
    }

    #[tokio::test]
    async fn failed_push_keeps_dirty_flag() {
        let store = MemoryContentStore::new();
        store.set_fail_puts(true);

        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();
        tracker.add_task("A", Category::Roadmap, Priority::High, &alice());

        assert!(matches!(
            engine.push(&mut tracker, &alice()).await.unwrap_err(),
            SyncError::Commit(_)
        ));
        assert!(tracker.is_dirty());
        assert_eq!(engine.last_applied(), None);
        assert!(store.get(SNAPSHOT_PATH).await.is_ok());
    }

    #[tokio::test]
    async fn slow_remote_times_out_without_mutation() {
        let store = MemoryContentStore::new();
        seed(&store, &remote_snapshot(vec![task(1, "B")], Utc::now())).await;
        store.set_delay(Duration::from_millis(200));

        let mut engine = SyncEngine::new(
            store.clone(),
            SyncConfig {
                pull_timeout: Duration::from_millis(20),
                ..SyncConfig::default()
            },
        );
        let mut tracker = TrackerStore::new();

        assert!(matches!(
            engine.pull(&mut tracker).await.unwrap_err(),
            SyncError::Timeout(_)
        ));
        assert!(tracker.tasks().is_empty());
        assert_eq!(engine.last_applied(), None);
    }

    #[tokio::test]
    async fn cancelled_pull_leaves_state_untouched() {
        let store = MemoryContentStore::new();
        seed(&store, &remote_snapshot(vec![task(1, "B")], Utc::now())).await;
        store.set_delay(Duration::from_millis(200));

        let mut engine = engine(&store);
        let mut tracker = TrackerStore::new();

        // Abandon the in-flight pull by dropping its future.
        tokio::select! {
            _ = engine.pull(&mut tracker) => panic!("pull should not win the race"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }

        assert!(tracker.tasks().is_empty());
        assert_eq!(engine.last_applied(), None);

        // The engine is immediately usable again.
        store.set_delay(Duration::from_millis(0));
        assert_eq!(engine.pull(&mut tracker).await.unwrap(), MergeOutcome::Merged);
        assert_eq!(tracker.tasks()[0].name, "B");
    }
}
