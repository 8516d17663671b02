//! Filesystem snapshot backend, plus the enum that picks the configured
//! backend at startup.
//!
//! Documents are plain files under a base directory; the revision tag of
//! a document is the SHA-256 of its content, so an unchanged file keeps
//! its revision across restarts.

use std::path::{Path, PathBuf};

use cadence_sync::{ContentStore, GithubContentStore, RemoteError, RevisionTag};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

/// Filesystem-backed [`ContentStore`].
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    base_path: PathBuf,
}

impl FileSnapshotStore {
    pub async fn new(base_path: PathBuf) -> Result<Self, RemoteError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| RemoteError::Transport(format!("create snapshot dir: {e}")))?;

        info!(path = %base_path.display(), "snapshot store initialized");
        Ok(Self { base_path })
    }

    /// Resolve a document path under the base directory, rejecting any
    /// traversal component.
    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let mut resolved = self.base_path.clone();
        for component in Path::new(path).components() {
            match component {
                std::path::Component::Normal(c) => resolved.push(c),
                _ => {
                    return Err(RemoteError::Content(format!(
                        "invalid snapshot path: {path}"
                    )))
                }
            }
        }
        Ok(resolved)
    }

    async fn current_revision(&self, file: &Path) -> Result<Option<RevisionTag>, RemoteError> {
        match fs::read(file).await {
            Ok(content) => Ok(Some(revision_of(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RemoteError::Transport(e.to_string())),
        }
    }
}

impl ContentStore for FileSnapshotStore {
    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, RevisionTag)>, RemoteError> {
        let file = self.resolve(path)?;
        match fs::read(&file).await {
            Ok(content) => {
                let revision = revision_of(&content);
                debug!(path, revision = %revision, bytes = content.len(), "read snapshot");
                Ok(Some((content, revision)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RemoteError::Transport(e.to_string())),
        }
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        previous: Option<&str>,
    ) -> Result<RevisionTag, RemoteError> {
        let file = self.resolve(path)?;

        if let Some(expected) = previous {
            let current = self.current_revision(&file).await?;
            if current.as_deref() != Some(expected) {
                return Err(RemoteError::Conflict);
            }
        }

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
        }

        let revision = revision_of(&content);
        fs::write(&file, &content)
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        debug!(path, revision = %revision, bytes = content.len(), "wrote snapshot");
        Ok(revision)
    }
}

fn revision_of(content: &[u8]) -> RevisionTag {
    hex::encode(Sha256::digest(content))
}

/// The snapshot backend selected by configuration.
pub enum SnapshotBackend {
    File(FileSnapshotStore),
    Github(GithubContentStore),
}

impl SnapshotBackend {
    pub async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, RevisionTag)>, RemoteError> {
        match self {
            SnapshotBackend::File(store) => store.get(path).await,
            SnapshotBackend::Github(store) => store.get(path).await,
        }
    }

    pub async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        previous: Option<&str>,
    ) -> Result<RevisionTag, RemoteError> {
        match self {
            SnapshotBackend::File(store) => store.put(path, content, previous).await,
            SnapshotBackend::Github(store) => store.put(path, content, previous).await,
        }
    }
}
