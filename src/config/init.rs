// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates stacklink.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

const TEMPLATE: &str = r#"# Region the function and registry live in.
region:
  env: AWS_REGION
  default: us-east-1

# Where the producer stack publishes its exports.
exchange:
  backend: aws
  bucket:
    env: STACKLINK_BUCKET
  key: pulumi-exports.json
  # Refuse documents older than this.
  # max_age: 1h

image:
  context: .
  tag: latest
  pin_digest: true

update:
  resource: function-image
  state_dir: .stacklink/state

gateway:
  name: app-api
  stage: prod
  routes:
    - ANY /
    - ANY /{proxy+}
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    // The template must always load.
    Config::from_yaml(TEMPLATE)?;
    std::fs::write(&config_path, TEMPLATE)?;
    tracing::info!(path = %config_path.display(), "wrote configuration template");

    Ok(())
}
