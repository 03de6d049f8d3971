// ABOUTME: Fetch command implementation.
// ABOUTME: Prints the published document or a single required key.

use serde_json::Value;

use super::backends;
use stacklink::config::Config;
use stacklink::error::Result;
use stacklink::output::{Output, OutputMode};

pub async fn fetch(config: &Config, key: Option<&str>, output: &Output) -> Result<()> {
    let exchange = backends::exchange(config)?;
    let location = config.exchange.location()?;
    let fetched = exchange
        .fetch_checked(&location, &config.exchange.freshness(None))
        .await?;

    match key {
        Some(key) => match fetched.document.require(key)? {
            Value::String(s) if output.mode() != OutputMode::Json => output.success(s),
            value => output.data(key, value),
        },
        None => output.data(&fetched.digest, &fetched.document),
    }
    Ok(())
}
