// ABOUTME: Error types for publishing and fetching export documents.
// ABOUTME: Separates absent, malformed, incomplete, and stale documents.

use std::time::Duration;

use super::codec::{ParseError, SchemaError};
use super::store::{Location, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Nothing has been published at the location yet.
    #[error("no export document at {location}; has the producer stack been deployed?")]
    NotFound { location: Location },

    #[error("export document at {location} is malformed: {source}")]
    Parse {
        location: Location,
        source: ParseError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to encode export document: {0}")]
    Encode(#[from] serde_json::Error),

    /// The document exists but fails the caller's freshness requirement.
    #[error("export document at {location} is stale: {reason}")]
    Stale {
        location: Location,
        reason: StaleReason,
    },

    #[error(transparent)]
    Store(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleReason {
    #[error("digest {actual} does not match expected {expected}")]
    DigestMismatch { expected: String, actual: String },

    #[error("last written {}s ago, limit is {}s", .age.as_secs(), .max_age.as_secs())]
    TooOld { age: Duration, max_age: Duration },

    #[error("backend does not report modification times, cannot enforce a maximum age")]
    UnknownAge,
}

impl From<StoreError> for ExchangeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(location) => ExchangeError::NotFound { location },
            other => ExchangeError::Store(other),
        }
    }
}
