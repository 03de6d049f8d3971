// ABOUTME: Target identifiers for function updates.
// ABOUTME: Accepts a bare function name or a full function ARN.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_NAME_LEN: usize = 64;
const MAX_ARN_LEN: usize = 140;

#[derive(Debug, Error)]
pub enum FunctionNameError {
    #[error("function name cannot be empty")]
    Empty,

    #[error("function identifier exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("invalid character in function identifier: '{0}'")]
    InvalidChar(char),
}

/// A function name (`my-fn`) or ARN (`arn:aws:lambda:us-east-1:123:function:my-fn`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionName(String);

impl FunctionName {
    pub fn new(value: &str) -> Result<Self, FunctionNameError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(FunctionNameError::Empty);
        }

        let is_arn = value.starts_with("arn:");
        let limit = if is_arn { MAX_ARN_LEN } else { MAX_NAME_LEN };
        if value.len() > limit {
            return Err(FunctionNameError::TooLong(limit));
        }

        for c in value.chars() {
            let allowed = c.is_ascii_alphanumeric()
                || c == '-'
                || c == '_'
                || (is_arn && (c == ':' || c == '.'));
            if !allowed {
                return Err(FunctionNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_arn(&self) -> bool {
        self.0.starts_with("arn:")
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FunctionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FunctionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FunctionName::new(&s).map_err(serde::de::Error::custom)
    }
}
