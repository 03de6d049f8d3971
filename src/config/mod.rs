// ABOUTME: Configuration types and parsing for stacklink.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and discovery.

mod deserialize;
mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::exchange::{DEFAULT_EXPORTS_KEY, ExportKeys, Freshness, Location};
use crate::gateway::{DEFAULT_STAGE, GatewayPlanBuilder, GatewayPlan, Route};
use crate::process::DEFAULT_TIMEOUT;
use crate::types::{Region, ResourceName};
use deserialize::deserialize_routes;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stacklink.yml";
pub const CONFIG_FILENAME_ALT: &str = "stacklink.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stacklink/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub region: EnvValue,

    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub keys: ExportKeys,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub gateway: Option<GatewayConfig>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Aws,
    /// A local directory standing in for the bucket.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub backend: Backend,

    pub bucket: EnvValue,

    #[serde(default = "default_exports_key")]
    pub key: String,

    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Reject documents last written longer ago than this.
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

fn default_exports_key() -> String {
    DEFAULT_EXPORTS_KEY.to_string()
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".stacklink/store")
}

impl ExchangeConfig {
    pub fn location(&self) -> Result<Location> {
        let bucket = self.bucket.resolve()?;
        Location::new(bucket, &self.key).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn freshness(&self, expected_digest: Option<String>) -> Freshness {
        Freshness {
            expected_digest,
            max_age: self.max_age,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Repository to push to. Defaults to the repository URL in the exports.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_context")]
    pub context: PathBuf,

    #[serde(default)]
    pub dockerfile: Option<PathBuf>,

    #[serde(default = "default_tag")]
    pub tag: EnvValue,

    /// Deploy by digest instead of tag.
    #[serde(default = "default_pin_digest")]
    pub pin_digest: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: None,
            context: default_context(),
            dockerfile: None,
            tag: default_tag(),
            pin_digest: default_pin_digest(),
        }
    }
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_tag() -> EnvValue {
    EnvValue::literal("latest")
}

fn default_pin_digest() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_resource")]
    pub resource: String,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_resource() -> String {
    "function-image".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".stacklink/state")
}

impl UpdateConfig {
    pub fn resource_name(&self) -> Result<ResourceName> {
        ResourceName::new(&self.resource)
            .map_err(|e| Error::InvalidConfig(format!("update.resource: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_stage")]
    pub stage: String,

    #[serde(deserialize_with = "deserialize_routes")]
    pub routes: NonEmpty<Route>,
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

impl GatewayConfig {
    pub fn plan(&self) -> GatewayPlanBuilder {
        GatewayPlan::builder(&self.name)
            .description(&self.description)
            .stage(&self.stage)
            .routes(self.routes.iter().cloned())
    }
}

fn default_command_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.update.resource_name()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn region(&self) -> Result<Region> {
        self.region.resolve_with("region", Region::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
region: us-east-1
exchange:
  bucket: shared-exports
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.exchange.backend, Backend::Aws);
        assert_eq!(config.exchange.key, DEFAULT_EXPORTS_KEY);
        assert_eq!(config.keys, ExportKeys::default());
        assert_eq!(config.update.resource, "function-image");
        assert!(config.image.pin_digest);
        assert!(config.gateway.is_none());
        assert_eq!(config.command_timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            config.exchange.location().unwrap().to_string(),
            "shared-exports/pulumi-exports.json"
        );
    }

    #[test]
    fn invalid_resource_name_is_rejected() {
        let yaml = format!("{MINIMAL}update:\n  resource: Not_Valid\n");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn routes_accept_both_forms() {
        let yaml = format!(
            "{MINIMAL}gateway:\n  name: api\n  routes:\n    - GET /items\n    - method: post\n      path: /items/{{id}}\n"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let gateway = config.gateway.unwrap();
        assert_eq!(gateway.routes.len(), 2);
        assert_eq!(gateway.routes.last().to_string(), "POST /items/{id}");
        assert_eq!(gateway.stage, DEFAULT_STAGE);
    }

    #[test]
    fn empty_route_list_is_rejected() {
        let yaml = format!("{MINIMAL}gateway:\n  name: api\n  routes: []\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}
