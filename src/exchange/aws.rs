// ABOUTME: S3-backed object store driven through the aws CLI.
// ABOUTME: head-object for metadata and existence, s3 cp over stdin/stdout for bodies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::store::{Location, ObjectStore, StoreError, StoredObject};
use crate::process::{CommandOutput, CommandSpec, DEFAULT_TIMEOUT};
use crate::types::Region;

/// S3 through the `aws` executable on `PATH` (or an explicit program path).
#[derive(Debug, Clone)]
pub struct AwsCliStore {
    program: String,
    region: Option<Region>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HeadObject {
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

impl AwsCliStore {
    pub fn new(region: Option<Region>) -> Self {
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

    fn command(&self) -> CommandSpec {
        let spec = CommandSpec::new(&self.program).timeout(self.timeout);
        match self.region {
            Some(ref region) => spec.args(["--region", region.as_str()]),
            None => spec,
        }
    }

    fn s3_url(location: &Location) -> String {
        format!("s3://{}/{}", location.bucket(), location.key())
    }

    fn failure(location: &Location, output: &CommandOutput) -> StoreError {
        if is_missing_object(&output.stderr) {
            return StoreError::NotFound(location.clone());
        }
        StoreError::Backend {
            location: location.clone(),
            message: format!(
                "aws exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            ),
        }
    }
}

/// The CLI reports a missing key as a 404 from HeadObject or NoSuchKey from GetObject.
fn is_missing_object(stderr: &str) -> bool {
    stderr.contains("(404)") || stderr.contains("Not Found") || stderr.contains("NoSuchKey")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl ObjectStore for AwsCliStore {
    fn backend(&self) -> &'static str {
        "aws-s3"
    }

    async fn put(
        &self,
        location: &Location,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        tracing::info!(%location, bytes = body.len(), "uploading object");
        let output = self
            .command()
            .args(["s3", "cp", "-"])
            .arg(Self::s3_url(location))
            .args(["--content-type", content_type])
            .stdin(body)
            .run()
            .await?;

        if !output.success() {
            return Err(Self::failure(location, &output));
        }
        Ok(())
    }

    async fn get(&self, location: &Location) -> Result<StoredObject, StoreError> {
        let head = self
            .command()
            .args(["s3api", "head-object", "--output", "json"])
            .args(["--bucket", location.bucket(), "--key", location.key()])
            .run()
            .await?;

        if !head.success() {
            return Err(Self::failure(location, &head));
        }

        let meta: HeadObject =
            serde_json::from_str(&head.stdout).map_err(|e| StoreError::Backend {
                location: location.clone(),
                message: format!("unreadable head-object output: {e}"),
            })?;

        tracing::debug!(%location, "downloading object");
        let body = self
            .command()
            .args(["s3", "cp"])
            .arg(Self::s3_url(location))
            .arg("-")
            .run()
            .await?;

        if !body.success() {
            return Err(Self::failure(location, &body));
        }

        Ok(StoredObject {
            body: body.stdout.into_bytes(),
            content_type: meta.content_type,
            last_modified: meta.last_modified.as_deref().and_then(parse_timestamp),
        })
    }
}
