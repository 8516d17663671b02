use thiserror::Error;

/// Errors from the signed-token codec.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Input was not valid URL-safe base64 or did not decode to the
    /// expected JSON shape.
    #[error("Invalid token encoding")]
    Decode,

    /// Token did not have the `payload.signature` form.
    #[error("Malformed token")]
    Malformed,

    /// Recomputed signature did not match the supplied one.
    #[error("Signature mismatch")]
    BadSignature,
}

/// Errors from the one-time-code protocol.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// The signing secret is missing. Fatal, operator-facing.
    #[error("Auth is not configured (missing signing secret)")]
    NotConfigured,

    /// The claimed email does not match the allow-listed domain.
    #[error("Email is not on the allow list")]
    UnauthorizedEmail,

    /// Token was missing a segment or its payload did not decode.
    #[error("Malformed token")]
    MalformedToken,

    /// Signature check failed: tampered token or wrong secret.
    /// The two cases are never distinguished.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token was issued for a different email than the one claimed.
    #[error("Token was issued for a different email")]
    IdentityMismatch,

    /// The code's validity window has passed.
    #[error("Code expired")]
    Expired,

    /// Submitted code does not hash to the one bound into the token.
    #[error("Invalid code")]
    InvalidCode,
}

impl AuthError {
    /// Client-facing message. Internal distinctions (signature failure vs
    /// malformed token, unauthorized vs mismatched email) collapse so the
    /// response does not reveal which check failed.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::NotConfigured => "Server not configured",
            AuthError::UnauthorizedEmail | AuthError::IdentityMismatch => {
                "Invalid or unauthorized email"
            }
            AuthError::MalformedToken | AuthError::InvalidSignature => "Invalid token",
            AuthError::Expired => "Code expired",
            AuthError::InvalidCode => "Invalid code",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::BadSignature => AuthError::InvalidSignature,
            TokenError::Decode | TokenError::Malformed => AuthError::MalformedToken,
        }
    }
}
