// ABOUTME: Application-wide error type for stacklink.
// ABOUTME: Wraps module errors and classifies each into one fatal error kind.

use std::path::PathBuf;
use thiserror::Error;

use crate::credentials::{MalformedTokenError, TokenIssueError};
use crate::exchange::{ExchangeError, ParseError, SchemaError, StoreError};
use crate::gateway::GatewayError;
use crate::image::ImageError;
use crate::orchestrator::{ConvergeError, OrderingError};
use crate::process::CommandError;
use crate::resource::{ApplyError, LedgerError, MalformedRequest};
use crate::types::{FunctionName, ImageRef};

/// The failure classes a run can abort with. None is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Schema,
    MalformedToken,
    ExternalCall,
    Ordering,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("stack outputs in {} are malformed: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed registry token: {0}")]
    MalformedToken(#[from] MalformedTokenError),

    #[error(transparent)]
    TokenIssue(#[from] TokenIssueError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("malformed update request: {0}")]
    Request(#[from] MalformedRequest),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The function was updated but the ledger write that follows failed.
    #[error("function {target} now runs {image} but its update record was not saved: {source}")]
    Unrecorded {
        target: FunctionName,
        image: ImageRef,
        #[source]
        source: LedgerError,
    },

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Converge(#[from] ConvergeError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::InvalidLocation(_) => ErrorKind::Config,
        StoreError::Io { .. } => ErrorKind::Io,
        StoreError::Backend { .. } | StoreError::Command(_) => ErrorKind::ExternalCall,
    }
}

impl Error {
    /// Whether the failing operation had already changed something outside
    /// the process before it failed.
    pub fn left_external_effect(&self) -> bool {
        matches!(self, Error::Unrecorded { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::MissingEnvVar(_)
            | Error::InvalidConfig(_)
            | Error::Yaml(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Source { .. } => ErrorKind::Parse,
            Error::Exchange(e) => match e {
                ExchangeError::NotFound { .. } => ErrorKind::NotFound,
                ExchangeError::Parse { .. } | ExchangeError::Encode(_) => ErrorKind::Parse,
                ExchangeError::Schema(_) => ErrorKind::Schema,
                ExchangeError::Stale { .. } => ErrorKind::Ordering,
                ExchangeError::Store(e) => store_kind(e),
            },
            Error::Schema(_) | Error::Request(_) => ErrorKind::Schema,
            Error::Store(e) => store_kind(e),
            Error::MalformedToken(_) => ErrorKind::MalformedToken,
            Error::TokenIssue(_)
            | Error::Image(_)
            | Error::Apply(_)
            | Error::Command(_) => ErrorKind::ExternalCall,
            Error::Ledger(e) | Error::Unrecorded { source: e, .. } => match e {
                LedgerError::Store(e) => store_kind(e),
                LedgerError::Corrupt { .. } | LedgerError::Encode(_) => ErrorKind::Parse,
            },
            Error::Ordering(_) => ErrorKind::Ordering,
            Error::Converge(e) => match e {
                ConvergeError::StepFailed { source, .. } => source.kind(),
                ConvergeError::ForeignDependency { .. } | ConvergeError::DuplicateStep { .. } => {
                    ErrorKind::Ordering
                }
            },
            Error::Gateway(GatewayError::NotAnArn(_)) => ErrorKind::Schema,
            Error::Gateway(_) => ErrorKind::Config,
            Error::Json(_) => ErrorKind::Parse,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Location;

    #[test]
    fn store_not_found_is_not_found() {
        let loc = Location::new("b", "k").unwrap();
        let err: Error = ExchangeError::from(StoreError::NotFound(loc)).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn failed_step_reports_the_underlying_kind() {
        let err: Error = ConvergeError::StepFailed {
            step: "resolve-credentials".to_string(),
            fired: Vec::new(),
            source: Box::new(Error::MalformedToken(MalformedTokenError::MissingDelimiter)),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::MalformedToken);
    }

    #[test]
    fn missing_edge_is_ordering() {
        let err: Error = OrderingError::MissingEdge {
            step: "a".to_string(),
            producer: "b".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Ordering);
    }
}
