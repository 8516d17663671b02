//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development; a missing `AUTH_SECRET` simply
//! disables the auth endpoints (they answer with a configuration error).

use std::net::SocketAddr;
use std::path::PathBuf;

use cadence_shared::constants::{DEFAULT_HTTP_PORT, SNAPSHOT_PATH};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// HMAC signing secret for code, token, and session signatures.
    /// Env: `AUTH_SECRET`
    /// Default: empty (auth endpoints disabled).
    pub auth_secret: String,

    /// Only emails under this domain may request codes; also the
    /// admin-domain test for identities not on the roster.
    /// Env: `ALLOWED_EMAIL_DOMAIN` (e.g. `example.com`)
    /// Default: none (any email accepted -- development only).
    pub allowed_email_domain: Option<String>,

    /// Resend API key for sending one-time codes by email.
    /// Env: `RESEND_API_KEY`
    /// Default: none (codes are logged instead of emailed).
    pub resend_api_key: Option<String>,

    /// From address for code emails, e.g. `Cadence <no-reply@example.com>`.
    /// Env: `AUTH_FROM_EMAIL`
    pub from_email: Option<String>,

    /// JSON file with the team roster (array of members).
    /// Env: `TEAM_ROSTER`
    pub roster_path: Option<PathBuf>,

    /// Directory for the filesystem snapshot backend.
    /// Env: `SNAPSHOT_DIR`
    /// Default: `./snapshots`
    pub snapshot_dir: PathBuf,

    /// Path of the snapshot document inside the backend.
    /// Env: `SNAPSHOT_PATH`
    pub snapshot_path: String,

    /// GitHub repository for the snapshot backend, `owner/repo`.
    /// Env: `GITHUB_REPO` (requires `GITHUB_TOKEN`)
    pub github_repo: Option<(String, String)>,

    /// Token with contents access to the data repository.
    /// Env: `GITHUB_TOKEN`
    pub github_token: Option<String>,

    /// Branch the snapshot file lives on.
    /// Env: `GITHUB_BRANCH`
    /// Default: `main`
    pub github_branch: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            auth_secret: String::new(),
            allowed_email_domain: None,
            resend_api_key: None,
            from_email: None,
            roster_path: None,
            snapshot_dir: PathBuf::from("./snapshots"),
            snapshot_path: SNAPSHOT_PATH.to_string(),
            github_repo: None,
            github_token: None,
            github_branch: "main".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(secret) = std::env::var("AUTH_SECRET") {
            config.auth_secret = secret;
        }

        if let Ok(domain) = std::env::var("ALLOWED_EMAIL_DOMAIN") {
            if !domain.is_empty() {
                config.allowed_email_domain = Some(domain);
            }
        }

        if let Ok(key) = std::env::var("RESEND_API_KEY") {
            if !key.is_empty() {
                config.resend_api_key = Some(key);
            }
        }

        if let Ok(from) = std::env::var("AUTH_FROM_EMAIL") {
            if !from.is_empty() {
                config.from_email = Some(from);
            }
        }

        if let Ok(path) = std::env::var("TEAM_ROSTER") {
            if !path.is_empty() {
                config.roster_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            config.snapshot_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("SNAPSHOT_PATH") {
            if !path.is_empty() {
                config.snapshot_path = path;
            }
        }

        if let Ok(repo) = std::env::var("GITHUB_REPO") {
            match repo.split_once('/') {
                Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                    config.github_repo = Some((owner.to_string(), name.to_string()));
                }
                _ => tracing::warn!(value = %repo, "Invalid GITHUB_REPO, expected owner/repo"),
            }
        }

        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                config.github_token = Some(token);
            }
        }

        if let Ok(branch) = std::env::var("GITHUB_BRANCH") {
            if !branch.is_empty() {
                config.github_branch = branch;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// True when the GitHub snapshot backend is fully configured.
    pub fn github_backend(&self) -> Option<(String, String, String)> {
        match (&self.github_repo, &self.github_token) {
            (Some((owner, repo)), Some(token)) => {
                Some((owner.clone(), repo.clone(), token.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.auth_secret.is_empty());
        assert_eq!(config.snapshot_path, SNAPSHOT_PATH);
        assert!(config.github_backend().is_none());
    }

    #[test]
    fn github_backend_needs_repo_and_token() {
        let mut config = ServerConfig::default();
        config.github_repo = Some(("acme".to_string(), "data".to_string()));
        assert!(config.github_backend().is_none());
        config.github_token = Some("tok".to_string());
        assert_eq!(
            config.github_backend(),
            Some(("acme".to_string(), "data".to_string(), "tok".to_string()))
        );
    }
}
