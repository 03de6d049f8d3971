// ABOUTME: Container image build and push to the registry named in the exports.
// ABOUTME: The docker CLI implementation logs in with --password-stdin and recovers the digest.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::CredentialBundle;
use crate::process::{CommandError, CommandOutput, CommandSpec, DEFAULT_TIMEOUT};
use crate::types::{ImageDigest, ImageRef};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("docker {step} failed for {image}: {stderr}")]
    Failed {
        step: &'static str,
        image: String,
        stderr: String,
    },

    #[error("registry login to {server} failed: {stderr}")]
    Login { server: String, stderr: String },

    #[error("no repository digest recorded for {0} after push")]
    MissingDigest(String),

    #[error("credentials for {server} expired before the push")]
    CredentialsExpired { server: String },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// What to build and where it goes.
#[derive(Debug, Clone)]
pub struct ImageBuild {
    pub image: ImageRef,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    /// The push fails unless the registry digest can be recovered.
    pub require_digest: bool,
}

/// A pushed image and its content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    pub image: ImageRef,
    pub digest: Option<ImageDigest>,
}

impl PushedImage {
    /// The reference a function update should use.
    ///
    /// With `pin` set and a digest known, the reference is digest-addressed
    /// so reusing a mutable tag cannot leave the function on older content.
    pub fn deploy_reference(&self, pin: bool) -> ImageRef {
        match (pin, &self.digest) {
            (true, Some(digest)) => self.image.pinned(digest),
            _ => self.image.clone(),
        }
    }
}

/// Builds and pushes images.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(
        &self,
        build: &ImageBuild,
        credentials: &CredentialBundle,
    ) -> Result<PushedImage, ImageError>;
}

#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    timeout: Duration,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
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
        CommandSpec::new(&self.program).timeout(self.timeout)
    }

    fn check(
        step: &'static str,
        image: &ImageRef,
        output: CommandOutput,
    ) -> Result<CommandOutput, ImageError> {
        if output.success() {
            return Ok(output);
        }
        Err(ImageError::Failed {
            step,
            image: image.to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }

    async fn build(&self, build: &ImageBuild) -> Result<(), ImageError> {
        let mut spec = self
            .command()
            .args(["build", "--tag"])
            .arg(build.image.to_string());
        if let Some(ref dockerfile) = build.dockerfile {
            spec = spec
                .arg("--file")
                .arg(dockerfile.to_string_lossy().into_owned());
        }
        let spec = spec.arg(build.context.to_string_lossy().into_owned());

        tracing::info!(image = %build.image, context = %build.context.display(), "building image");
        Self::check("build", &build.image, spec.run().await?)?;
        Ok(())
    }

    async fn login(&self, credentials: &CredentialBundle) -> Result<(), ImageError> {
        tracing::debug!(server = %credentials.server, "logging in to registry");
        let output = self
            .command()
            .args(["login", "--username", credentials.username.as_str()])
            .arg("--password-stdin")
            .arg(credentials.server.as_str())
            .stdin(credentials.password.as_bytes().to_vec())
            .run()
            .await?;
        if !output.success() {
            return Err(ImageError::Login {
                server: credentials.server.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn push(&self, image: &ImageRef) -> Result<(), ImageError> {
        tracing::info!(%image, "pushing image");
        let spec = self.command().arg("push").arg(image.to_string());
        Self::check("push", image, spec.run().await?)?;
        Ok(())
    }

    async fn digest(&self, image: &ImageRef) -> Result<ImageDigest, ImageError> {
        let spec = self
            .command()
            .args(["image", "inspect", "--format", "{{json .RepoDigests}}"])
            .arg(image.to_string());
        let output = Self::check("inspect", image, spec.run().await?)?;
        repo_digest(&output.stdout, &image.repository())
            .ok_or_else(|| ImageError::MissingDigest(image.to_string()))
    }
}

/// Pick the digest for `repository` out of `docker image inspect` RepoDigests.
fn repo_digest(raw: &str, repository: &str) -> Option<ImageDigest> {
    let digests: Vec<String> = serde_json::from_str(raw.trim()).ok()?;
    digests.iter().find_map(|entry| {
        let (repo, digest) = entry.split_once('@')?;
        (repo == repository).then(|| ImageDigest::new(digest))
    })
}

#[async_trait]
impl ImagePublisher for DockerCli {
    async fn publish(
        &self,
        build: &ImageBuild,
        credentials: &CredentialBundle,
    ) -> Result<PushedImage, ImageError> {
        if credentials.is_expired_at(chrono::Utc::now()) {
            return Err(ImageError::CredentialsExpired {
                server: credentials.server.clone(),
            });
        }
        self.build(build).await?;
        self.login(credentials).await?;
        self.push(&build.image).await?;
        let digest = if build.require_digest {
            Some(self.digest(&build.image).await?)
        } else {
            None
        };
        tracing::info!(image = %build.image, digest = ?digest, "image pushed");
        Ok(PushedImage {
            image: build.image.clone(),
            digest,
        })
    }
}
