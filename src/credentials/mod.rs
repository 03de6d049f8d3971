// ABOUTME: Registry credential resolution from temporary authorization tokens.
// ABOUTME: Tokens are base64 "<username>:<password>" and must be re-resolved every run.

mod issuer;

pub use issuer::{AwsCliTokenIssuer, RegistryToken, TokenIssueError, TokenIssuer};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};

/// Why a raw token could not be turned into credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTokenError {
    #[error("token is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("decoded token is not valid UTF-8")]
    InvalidUtf8,

    #[error("decoded token has no ':' separating username and password")]
    MissingDelimiter,

    #[error("decoded token has {count} ':' delimiters, expected exactly one")]
    ExtraDelimiter { count: usize },

    #[error("decoded token has an empty username")]
    EmptyUsername,

    #[error("decoded token has an empty password")]
    EmptyPassword,
}

/// Username and password for one registry, valid until the token expires.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub server: String,
    pub username: String,
    pub password: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CredentialBundle {
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the issuing token has lapsed at `now`. Bundles without a known
    /// expiry are treated as valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Decode `raw_token` into credentials for `server`.
///
/// Pure and deterministic. The decoded text must contain exactly one `:` with
/// non-empty text on both sides.
pub fn resolve(
    server: impl Into<String>,
    raw_token: &str,
) -> Result<CredentialBundle, MalformedTokenError> {
    let bytes = STANDARD
        .decode(raw_token.trim())
        .map_err(|e| MalformedTokenError::InvalidBase64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| MalformedTokenError::InvalidUtf8)?;

    let count = text.matches(':').count();
    let (username, password) = match count {
        0 => return Err(MalformedTokenError::MissingDelimiter),
        1 => text
            .split_once(':')
            .ok_or(MalformedTokenError::MissingDelimiter)?,
        count => return Err(MalformedTokenError::ExtraDelimiter { count }),
    };

    if username.is_empty() {
        return Err(MalformedTokenError::EmptyUsername);
    }
    if password.is_empty() {
        return Err(MalformedTokenError::EmptyPassword);
    }

    Ok(CredentialBundle {
        server: server.into(),
        username: username.to_string(),
        password: password.to_string(),
        expires_at: None,
    })
}
