//! # cadence-shared
//!
//! Types and protocol logic shared between the Cadence server and clients:
//!
//! - the signed-token codec (HMAC-SHA-256 over URL-safe base64 payloads)
//! - the one-time-code verifier for passwordless sign-in
//! - identity resolution against the team directory
//! - bearer session tokens
//! - the tracker domain model (tasks, cell assignments, change log,
//!   shared snapshots) and the week calendar
//!
//! Everything in this crate is pure computation; no I/O.

pub mod auth;
pub mod constants;
pub mod identity;
pub mod session;
pub mod token;
pub mod types;
pub mod weeks;

mod error;

pub use auth::{AuthConfig, CodeVerifier, IssuedCode};
pub use error::{AuthError, TokenError};
pub use identity::{Identity, TeamDirectory, TeamMember};
pub use types::*;
