// ABOUTME: Publish command implementation.
// ABOUTME: Merges stack output files and --set values, then uploads them as one document.

use serde_json::Value;
use std::path::PathBuf;

use super::backends;
use stacklink::config::Config;
use stacklink::error::{Error, Result};
use stacklink::output::Output;
use stacklink::pipeline::{self, ProducerSettings};

/// Structured values are accepted when they look like JSON objects or arrays;
/// everything else is exported as a string.
fn export_value(raw: String) -> Value {
    let trimmed = raw.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(value) = serde_json::from_str(&raw)
    {
        return value;
    }
    Value::String(raw)
}

pub async fn publish(
    config: &Config,
    sources: Vec<PathBuf>,
    values: Vec<(String, String)>,
    validate: bool,
    output: &Output,
) -> Result<()> {
    if sources.is_empty() && values.is_empty() {
        return Err(Error::InvalidConfig(
            "nothing to publish; pass --from-file or --set".to_string(),
        ));
    }

    let exchange = backends::exchange(config)?;
    let settings = ProducerSettings {
        location: config.exchange.location()?,
        keys: config.keys.clone(),
        validate,
        sources,
        values: values
            .into_iter()
            .map(|(key, value)| (key, export_value(value)))
            .collect(),
    };

    output.progress(&format!("Publishing exports to {}", settings.location));
    let outcome = pipeline::publish(&exchange, &settings).await?;

    output.data("published", &outcome.receipt);
    output.success(&format!(
        "Published {} keys to {} ({})",
        outcome.receipt.keys, outcome.receipt.location, outcome.receipt.digest
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_stay_strings() {
        assert_eq!(export_value("arn:x".into()), Value::String("arn:x".into()));
        assert_eq!(export_value("123".into()), Value::String("123".into()));
    }

    #[test]
    fn json_values_are_structured() {
        assert_eq!(export_value(r#"{"a": 1}"#.into()), serde_json::json!({"a": 1}));
        assert_eq!(export_value("[not json".into()), Value::String("[not json".into()));
    }
}
