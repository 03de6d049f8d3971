// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the consumer plan and reports the update record and gateway declaration.

use std::path::PathBuf;

use super::backends;
use stacklink::config::Config;
use stacklink::diagnostics::{Diagnostics, Warning};
use stacklink::error::{Error, Result};
use stacklink::output::Output;
use stacklink::pipeline::{self, ConsumerSettings, ImageSettings};

fn settings(config: &Config, expect_digest: Option<String>) -> Result<ConsumerSettings> {
    Ok(ConsumerSettings {
        location: config.exchange.location()?,
        freshness: config.exchange.freshness(expect_digest),
        keys: config.keys.clone(),
        region: config.region()?,
        image: ImageSettings {
            repository: config.image.name.clone(),
            tag: config.image.tag.resolve()?,
            context: config.image.context.clone(),
            dockerfile: config.image.dockerfile.clone(),
            pin_digest: config.image.pin_digest,
        },
        resource: config.update.resource_name()?,
        gateway: config.gateway.as_ref().map(|gateway| gateway.plan()),
    })
}

pub async fn deploy(
    config: &Config,
    expect_digest: Option<String>,
    gateway_out: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let settings = settings(config, expect_digest)?;
    let deps = backends::consumer_deps(config)?;
    let mut diag = Diagnostics::default();

    if settings.freshness.expected_digest.is_none() && settings.freshness.max_age.is_none() {
        diag.warn(Warning::unchecked_freshness());
    }
    if !settings.image.pin_digest {
        diag.warn(Warning::unpinned_image(&settings.image.tag));
    }

    output.progress(&format!("Fetching exports from {}", settings.location));
    let outcome = match pipeline::deploy(&deps, &settings).await {
        Ok(outcome) => outcome,
        Err(Error::Converge(e)) => {
            for fired in e.fired_side_effects() {
                output.warning(&format!(
                    "'{fired}' already changed external state and was not reverted"
                ));
            }
            return Err(Error::Converge(e));
        }
        Err(e) => return Err(e),
    };

    if let Some(ref gateway) = outcome.gateway
        && let Some(ref path) = gateway_out
    {
        std::fs::write(path, gateway.to_json()?)?;
        output.progress(&format!("Wrote gateway declaration to {}", path.display()));
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    output.data("deployed", &outcome.record);
    output.success(&format!(
        "Function {} now runs {} (exports {})",
        outcome.record.target, outcome.image, outcome.exports_digest
    ));
    Ok(())
}
