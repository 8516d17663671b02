//! # cadence-server
//!
//! HTTP backend for the Cadence team tracker.
//!
//! This binary provides:
//! - **Passwordless auth**: stateless one-time-code issuance and
//!   verification (`/send-code`, `/verify-code`), codes dispatched by
//!   email via Resend (or logged in development)
//! - **Shared snapshot storage**: whole-document read/replace of the
//!   team's tracker state (`/snapshot`), backed by the filesystem or a
//!   GitHub repository
//! - **Per-IP rate limiting**, strictest on code issuance

mod api;
mod config;
mod error;
mod mailer;
mod rate_limit;
mod snapshot_store;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cadence_shared::{AuthConfig, CodeVerifier, TeamDirectory, TeamMember};
use cadence_sync::{GithubConfig, GithubContentStore};

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::mailer::{Mailer, ResendSender};
use crate::rate_limit::RateLimiter;
use crate::snapshot_store::{FileSnapshotStore, SnapshotBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cadence_server=debug")),
        )
        .init();

    info!("Starting Cadence server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        allowed_domain = ?config.allowed_email_domain,
        email_enabled = config.resend_api_key.is_some(),
        github_backend = config.github_backend().is_some(),
        "Loaded configuration"
    );
    if config.auth_secret.is_empty() {
        warn!("AUTH_SECRET is not set; auth endpoints will refuse every request");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    let roster = load_roster(&config)?;
    let directory = TeamDirectory::new(roster, config.allowed_email_domain.clone());
    let verifier = CodeVerifier::new(
        AuthConfig::new(
            config.auth_secret.clone().into_bytes(),
            config.allowed_email_domain.clone(),
        ),
        directory,
    );

    let mailer = match (&config.resend_api_key, &config.from_email) {
        (Some(key), Some(from)) => Mailer::Resend(
            ResendSender::new(key.clone(), from.clone())
                .map_err(|e| anyhow::anyhow!("mailer init failed: {e}"))?,
        ),
        _ => {
            info!("RESEND_API_KEY / AUTH_FROM_EMAIL not set; codes will be logged");
            Mailer::Log
        }
    };

    let snapshots = match config.github_backend() {
        Some((owner, repo, token)) => {
            info!(owner = %owner, repo = %repo, "using GitHub snapshot backend");
            let mut github = GithubConfig::new(owner, repo, token);
            github.branch = config.github_branch.clone();
            SnapshotBackend::Github(GithubContentStore::new(github)?)
        }
        None => {
            info!(dir = %config.snapshot_dir.display(), "using filesystem snapshot backend");
            SnapshotBackend::File(FileSnapshotStore::new(config.snapshot_dir.clone()).await?)
        }
    };

    let rate_limiter = RateLimiter::lenient();
    let send_code_limiter = RateLimiter::strict();

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let limiters = (rate_limiter.clone(), send_code_limiter.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiters.0.purge_stale(600.0).await;
            limiters.1.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let state = AppState {
        verifier: Arc::new(verifier),
        mailer: Arc::new(mailer),
        snapshots: Arc::new(snapshots),
        config: Arc::new(config),
        rate_limiter,
        send_code_limiter,
    };

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn load_roster(config: &ServerConfig) -> anyhow::Result<Vec<TeamMember>> {
    let Some(path) = &config.roster_path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read roster {}: {e}", path.display()))?;
    let members: Vec<TeamMember> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid roster {}: {e}", path.display()))?;
    info!(members = members.len(), "team roster loaded");
    Ok(members)
}
