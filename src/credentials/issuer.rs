// ABOUTME: Issuance of temporary registry authorization tokens.
// ABOUTME: The aws CLI implementation calls ecr get-authorization-token.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::process::{CommandError, CommandSpec, DEFAULT_TIMEOUT};
use crate::types::{Region, RegistryId};

/// A raw token as issued, before it is decoded into credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryToken {
    /// base64 `"<username>:<password>"`.
    pub token: String,
    /// Registry endpoint the token is valid for, without scheme.
    pub server: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RegistryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryToken")
            .field("server", &self.server)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenIssueError {
    #[error("token request for registry {registry} failed: {message}")]
    Rejected { registry: String, message: String },

    #[error("token response could not be read: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Source of short-lived registry tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, registry: &RegistryId) -> Result<RegistryToken, TokenIssueError>;
}

/// ECR tokens through the `aws` executable.
#[derive(Debug, Clone)]
pub struct AwsCliTokenIssuer {
    program: String,
    region: Region,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationResponse {
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    authorization_token: String,
    proxy_endpoint: String,
    #[serde(default)]
    expires_at: Option<serde_json::Value>,
}

impl AwsCliTokenIssuer {
    pub fn new(region: Region) -> Self {
        Self {
            program: "aws".to_string(),
            region,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The CLI prints either an ISO timestamp or epoch seconds depending on version.
fn parse_expiry(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok(),
        serde_json::Value::Number(n) => {
            let secs = n.as_f64()?;
            Utc.timestamp_opt(secs as i64, 0).single()
        }
        _ => None,
    }
}

fn parse_response(raw: &str) -> Result<RegistryToken, TokenIssueError> {
    let response: AuthorizationResponse =
        serde_json::from_str(raw).map_err(|e| TokenIssueError::InvalidResponse(e.to_string()))?;
    let data = response
        .authorization_data
        .into_iter()
        .next()
        .ok_or_else(|| TokenIssueError::InvalidResponse("no authorizationData".to_string()))?;

    let server = data
        .proxy_endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string();

    Ok(RegistryToken {
        token: data.authorization_token,
        server,
        expires_at: data.expires_at.as_ref().and_then(parse_expiry),
    })
}

#[async_trait]
impl TokenIssuer for AwsCliTokenIssuer {
    async fn issue(&self, registry: &RegistryId) -> Result<RegistryToken, TokenIssueError> {
        tracing::debug!(%registry, region = %self.region, "requesting registry token");
        let output = CommandSpec::new(&self.program)
            .timeout(self.timeout)
            .args(["ecr", "get-authorization-token", "--output", "json"])
            .args(["--region", self.region.as_str()])
            .args(["--registry-ids", registry.as_str()])
            .run()
            .await?;

        if !output.success() {
            return Err(TokenIssueError::Rejected {
                registry: registry.to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        parse_response(&output.stdout)
    }
}
