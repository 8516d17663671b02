//! Bearer session tokens issued after a successful code verification.
//!
//! Sessions reuse the same sealed-token codec as the code flow: the
//! resolved identity plus a validity window, signed under the server
//! secret. Nothing is stored server-side; presenting an unexpired,
//! correctly signed token is the whole credential.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SESSION_TTL_SECS;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::token;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SessionPayload {
    user: Identity,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Seal a session token for a verified identity.
pub fn issue_session(secret: &[u8], user: &Identity, ttl: Duration) -> String {
    let now = Utc::now();
    token::seal(
        secret,
        &SessionPayload {
            user: user.clone(),
            issued_at: now,
            expires_at: now + ttl,
        },
    )
}

/// [`issue_session`] with the default 24-hour lifetime.
pub fn issue_default_session(secret: &[u8], user: &Identity) -> String {
    issue_session(secret, user, Duration::seconds(SESSION_TTL_SECS))
}

/// Verify a bearer session token and return the identity it carries.
pub fn verify_session(secret: &[u8], sealed: &str) -> Result<Identity, AuthError> {
    let payload: SessionPayload = token::open(secret, sealed)?;
    if Utc::now() > payload.expires_at {
        return Err(AuthError::Expired);
    }
    Ok(payload.user)
}
