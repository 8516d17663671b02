//! Passwordless one-time-code protocol.
//!
//! `issue` draws a six-digit code and binds its keyed hash, the claimed
//! email, and a validity window into a signed token. `verify` replays the
//! checks from the token alone; the server keeps no per-code state, so a
//! token's validity is entirely reconstructable from the token plus the
//! secret. Logical states run `NoCode -> CodeIssued -> {Verified | Expired
//! | Rejected}`, re-derived on every call.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::constants::{CODE_MAX, CODE_MIN, CODE_TTL_SECS};
use crate::error::AuthError;
use crate::identity::{domain_matches, Identity, TeamDirectory};
use crate::token;

/// Configuration injected at construction. The signing secret lives here
/// and nowhere else; it must never be logged or echoed to a client.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Vec<u8>,
    /// When set, only emails under this domain may request codes.
    pub allowed_email_domain: Option<String>,
    pub code_ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: impl Into<Vec<u8>>, allowed_email_domain: Option<String>) -> Self {
        Self {
            secret: secret.into(),
            allowed_email_domain,
            code_ttl: Duration::seconds(CODE_TTL_SECS),
        }
    }
}

/// Result of issuing a code. The code is handed to the out-of-band
/// dispatch channel only; it must never reach the HTTP response.
#[derive(Debug)]
pub struct IssuedCode {
    pub code: String,
    pub token: String,
}

/// What gets sealed into the token at issuance. Unknown fields are
/// rejected on decode so a foreign payload cannot masquerade as ours.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CodePayload {
    email: String,
    code_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Issues and verifies one-time codes against an injected config and
/// team directory.
pub struct CodeVerifier {
    config: AuthConfig,
    directory: TeamDirectory,
}

impl CodeVerifier {
    pub fn new(config: AuthConfig, directory: TeamDirectory) -> Self {
        Self { config, directory }
    }

    fn ensure_configured(&self) -> Result<(), AuthError> {
        if self.config.secret.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        Ok(())
    }

    fn check_allowed(&self, email: &str) -> Result<(), AuthError> {
        if !email.contains('@') {
            return Err(AuthError::UnauthorizedEmail);
        }
        if let Some(domain) = self.config.allowed_email_domain.as_deref() {
            if !domain_matches(email, domain) {
                return Err(AuthError::UnauthorizedEmail);
            }
        }
        Ok(())
    }

    /// Issue a fresh code for the claimed email.
    pub fn issue(&self, email: &str) -> Result<IssuedCode, AuthError> {
        self.ensure_configured()?;
        let email = normalize(email);
        self.check_allowed(&email)?;

        let code = rand::rngs::OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string();
        let code_hash = token::sign(&self.config.secret, &code);

        let now = Utc::now();
        let payload = CodePayload {
            email,
            code_hash,
            issued_at: now,
            expires_at: now + self.config.code_ttl,
        };

        Ok(IssuedCode {
            code,
            token: token::seal(&self.config.secret, &payload),
        })
    }

    /// Verify a submitted code against the token it was issued with.
    ///
    /// Check order: token shape, signature, payload decode, identity,
    /// expiry, code. Signature and code-hash comparisons are
    /// constant-time.
    pub fn verify(
        &self,
        email: &str,
        submitted_code: &str,
        sealed_token: &str,
    ) -> Result<Identity, AuthError> {
        self.ensure_configured()?;
        let email = normalize(email);

        let payload: CodePayload = token::open(&self.config.secret, sealed_token)?;

        if payload.email != email {
            return Err(AuthError::IdentityMismatch);
        }
        if Utc::now() > payload.expires_at {
            return Err(AuthError::Expired);
        }

        let submitted_hash = token::sign(&self.config.secret, submitted_code.trim());
        let expected = payload.code_hash.as_bytes();
        let supplied = submitted_hash.as_bytes();
        if expected.len() != supplied.len() || expected.ct_eq(supplied).unwrap_u8() != 1 {
            return Err(AuthError::InvalidCode);
        }

        Ok(self.directory.resolve(&email))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> CodeVerifier {
        CodeVerifier::new(
            AuthConfig::new(b"unit-test-secret".to_vec(), Some("example.com".to_string())),
            TeamDirectory::default(),
        )
    }

    #[test]
    fn issue_then_verify_resolves_identity() {
        let v = verifier();
        let issued = v.issue("alice@example.com").unwrap();
        let id = v
            .verify("alice@example.com", &issued.code, &issued.token)
            .unwrap();
        assert_eq!(id.email, "alice@example.com");
        assert_eq!(id.display_name, "alice");
    }

    #[test]
    fn code_is_six_digits() {
        let v = verifier();
        for _ in 0..16 {
            let issued = v.issue("alice@example.com").unwrap();
            let n: u32 = issued.code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&n), "code {n} out of range");
        }
    }

    #[test]
    fn token_is_replayable_within_ttl() {
        // The protocol is stateless: a valid pair verifies more than
        // once until the expiry passes.
        let v = verifier();
        let issued = v.issue("alice@example.com").unwrap();
        assert!(v
            .verify("alice@example.com", &issued.code, &issued.token)
            .is_ok());
        assert!(v
            .verify("alice@example.com", &issued.code, &issued.token)
            .is_ok());
    }

    #[test]
    fn wrong_code_is_rejected() {
        let v = verifier();
        let issued = v.issue("alice@example.com").unwrap();
        let wrong = if issued.code == "100000" { "100001" } else { "100000" };
        assert_eq!(
            v.verify("alice@example.com", wrong, &issued.token).unwrap_err(),
            AuthError::InvalidCode
        );
    }

    #[test]
    fn expired_token_rejected_even_with_correct_code() {
        let mut config = AuthConfig::new(b"unit-test-secret".to_vec(), None);
        config.code_ttl = Duration::seconds(-1);
        let v = CodeVerifier::new(config, TeamDirectory::default());

        let issued = v.issue("alice@example.com").unwrap();
        assert_eq!(
            v.verify("alice@example.com", &issued.code, &issued.token)
                .unwrap_err(),
            AuthError::Expired
        );
    }

    #[test]
    fn mismatched_email_is_rejected() {
        let v = verifier();
        let issued = v.issue("alice@example.com").unwrap();
        assert_eq!(
            v.verify("mallory@example.com", &issued.code, &issued.token)
                .unwrap_err(),
            AuthError::IdentityMismatch
        );
    }

    #[test]
    fn tampered_payload_fails_as_invalid_signature() {
        let v = verifier();
        let issued = v.issue("alice@example.com").unwrap();
        let (payload, sig) = issued.token.split_once('.').unwrap();
        let mut chars: Vec<char> = payload.chars().collect();
        chars[1] = if chars[1] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        // Every subsequent attempt with the tampered token fails the same way.
        for _ in 0..3 {
            assert_eq!(
                v.verify(
                    "alice@example.com",
                    &issued.code,
                    &format!("{tampered}.{sig}")
                )
                .unwrap_err(),
                AuthError::InvalidSignature
            );
        }
    }

    #[test]
    fn wrong_secret_fails_as_invalid_signature() {
        let issuer = verifier();
        let other = CodeVerifier::new(
            AuthConfig::new(b"different-secret".to_vec(), Some("example.com".to_string())),
            TeamDirectory::default(),
        );
        let issued = issuer.issue("alice@example.com").unwrap();
        assert_eq!(
            other
                .verify("alice@example.com", &issued.code, &issued.token)
                .unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn missing_segment_is_malformed() {
        let v = verifier();
        assert_eq!(
            v.verify("alice@example.com", "123456", "segmentwithoutdot")
                .unwrap_err(),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn foreign_domain_cannot_request_codes() {
        let v = verifier();
        assert_eq!(
            v.issue("mallory@elsewhere.org").unwrap_err(),
            AuthError::UnauthorizedEmail
        );
        assert_eq!(v.issue("no-at-sign").unwrap_err(), AuthError::UnauthorizedEmail);
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        let v = CodeVerifier::new(
            AuthConfig::new(Vec::new(), None),
            TeamDirectory::default(),
        );
        assert_eq!(v.issue("alice@example.com").unwrap_err(), AuthError::NotConfigured);
    }
}
