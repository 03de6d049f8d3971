// ABOUTME: The external call that repoints a function at a new image.
// ABOUTME: aws CLI implementation runs lambda update-function-code without a shell.

use async_trait::async_trait;
use std::time::Duration;

use super::request::UpdateRequest;
use crate::process::{CommandError, CommandSpec, DEFAULT_TIMEOUT};

#[derive(Debug, thiserror::Error)]
pub enum ExternalCallError {
    #[error("`{command}` exited with {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Transport(#[from] CommandError),

    #[error("update rejected: {0}")]
    Rejected(String),
}

/// Mutates a function definition outside any declarative lifecycle.
///
/// Implementations issue the call unconditionally; there is no diffing
/// against the previous request.
#[async_trait]
pub trait ExternalMutation: Send + Sync {
    async fn update_function_image(&self, request: &UpdateRequest) -> Result<(), ExternalCallError>;
}

#[derive(Debug, Clone)]
pub struct AwsCliMutation {
    program: String,
    timeout: Duration,
}

impl Default for AwsCliMutation {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCliMutation {
    pub fn new() -> Self {
        Self {
            program: "aws".to_string(),
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

    fn command(&self, request: &UpdateRequest) -> CommandSpec {
        CommandSpec::new(&self.program)
            .timeout(self.timeout)
            .args(["lambda", "update-function-code", "--output", "json"])
            .args(["--function-name", request.target.as_str()])
            .arg("--image-uri")
            .arg(request.image.to_string())
            .args(["--region", request.region.as_str()])
    }
}

#[async_trait]
impl ExternalMutation for AwsCliMutation {
    async fn update_function_image(&self, request: &UpdateRequest) -> Result<(), ExternalCallError> {
        let spec = self.command(request);
        tracing::info!(
            function = %request.target,
            image = %request.image,
            region = %request.region,
            marker = %request.marker,
            "updating function image"
        );

        let rendered = format!("{} {}", spec.program(), spec.arguments().join(" "));
        let output = spec.run().await?;
        if !output.success() {
            return Err(ExternalCallError::NonZeroExit {
                command: rendered,
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_passes_fields_as_separate_arguments() {
        let request =
            UpdateRequest::parse("f1", "123.dkr.ecr.us-east-1.amazonaws.com/app:v2", "us-east-1")
                .unwrap();
        let spec = AwsCliMutation::new().command(&request);
        assert_eq!(spec.program(), "aws");
        let args = spec.arguments();
        let pos = args.iter().position(|a| a == "--image-uri").unwrap();
        assert_eq!(args[pos + 1], "123.dkr.ecr.us-east-1.amazonaws.com/app:v2");
        let pos = args.iter().position(|a| a == "--function-name").unwrap();
        assert_eq!(args[pos + 1], "f1");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_external_call_error() {
        let request = UpdateRequest::parse("f1", "repo:v2", "r1").unwrap();
        let mutation = AwsCliMutation::new().program("false");
        let err = mutation.update_function_image(&request).await.unwrap_err();
        assert!(matches!(err, ExternalCallError::NonZeroExit { code: Some(1), .. }));
    }
}
