// ABOUTME: Status command implementation.
// ABOUTME: Prints the ledger entry for the configured update resource.

use stacklink::config::Config;
use stacklink::error::Result;
use stacklink::output::Output;

use super::backends;

pub async fn status(config: &Config, output: &Output) -> Result<()> {
    let resource = config.update.resource_name()?;
    match backends::ledger(config).load(&resource).await? {
        Some(entry) => output.data(resource.as_str(), &entry),
        None => output.success(&format!("{resource}: never applied")),
    }
    Ok(())
}
