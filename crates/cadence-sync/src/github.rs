//! GitHub-backed [`ContentStore`]: the shared snapshot lives as a JSON
//! file committed to a repository, read and written through the contents
//! API.
//!
//! GitHub requires the current blob SHA to update an existing file, so a
//! `put` without an explicit previous revision first reads the current
//! SHA and then writes.  That read-then-write is *not* a conditional
//! update: two clients racing through it still clobber each other, later
//! write winning.
//!
//! [`ContentStore`]: crate::remote::ContentStore

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::RemoteError;
use crate::remote::{ContentStore, RevisionTag};

/// Repository coordinates and credentials.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API root, normally `https://api.github.com`.
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Token with `contents` write access to the data repository.
    pub token: String,
    /// Commit message used for snapshot updates.
    pub commit_message: String,
}

impl GithubConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            branch: "main".to_string(),
            token: token.into(),
            commit_message: "Update shared tracker data".to_string(),
        }
    }
}

/// [`ContentStore`] over the GitHub contents API.
///
/// [`ContentStore`]: crate::remote::ContentStore
#[derive(Clone)]
pub struct GithubContentStore {
    config: GithubConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    sha: String,
}

#[derive(Deserialize)]
struct UpdateResponse {
    content: UpdateContent,
}

#[derive(Deserialize)]
struct UpdateContent {
    sha: String,
}

impl GithubContentStore {
    pub fn new(config: GithubConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent("cadence")
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base, self.config.owner, self.config.repo, path
        )
    }

    async fn fetch_contents(&self, path: &str) -> Result<Option<ContentsResponse>, RemoteError> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())])
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Content(e.to_string()))?;
        Ok(Some(body))
    }
}

impl ContentStore for GithubContentStore {
    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, RevisionTag)>, RemoteError> {
        let Some(body) = self.fetch_contents(path).await? else {
            return Ok(None);
        };

        let encoded = body.content.unwrap_or_default();
        let content = decode_content(&encoded)?;
        debug!(path, sha = %body.sha, bytes = content.len(), "fetched snapshot from GitHub");
        Ok(Some((content, body.sha)))
    }

    async fn put(
        &self,
        path: &str,
        content: Vec<u8>,
        previous: Option<&str>,
    ) -> Result<RevisionTag, RemoteError> {
        // The API needs the current blob SHA to replace a file; absent an
        // explicit revision we look it up first (read-then-write, racy).
        let sha = match previous {
            Some(sha) => Some(sha.to_string()),
            None => self.fetch_contents(path).await?.map(|c| c.sha),
        };

        let mut payload = json!({
            "message": self.config.commit_message,
            "content": STANDARD.encode(&content),
            "branch": self.config.branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github.v3+json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        // GitHub answers 409 for a stale SHA.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(RemoteError::Conflict);
        }
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let body: UpdateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Content(e.to_string()))?;
        debug!(path, sha = %body.content.sha, "committed snapshot to GitHub");
        Ok(body.content.sha)
    }
}

/// The contents API returns base64 with embedded newlines.
fn decode_content(encoded: &str) -> Result<Vec<u8>, RemoteError> {
    let compact: String = encoded.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|e| RemoteError::Content(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_url_is_well_formed() {
        let store = GithubContentStore::new(GithubConfig::new("acme", "tracker-data", "tok"))
            .unwrap();
        assert_eq!(
            store.contents_url("shared-data/tracker-snapshot.json"),
            "https://api.github.com/repos/acme/tracker-data/contents/shared-data/tracker-snapshot.json"
        );
    }

    #[test]
    fn decode_content_strips_newlines() {
        let encoded = STANDARD.encode(b"hello world");
        let wrapped = format!("{}\n{}\n", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_content(&wrapped).unwrap(), b"hello world");
    }

    #[test]
    fn decode_content_rejects_garbage() {
        assert!(decode_content("!!not base64!!").is_err());
    }
}
