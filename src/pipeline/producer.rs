// ABOUTME: Producer run: collect resolved identifiers and publish them as one document.
// ABOUTME: The publish step depends on every source, so placeholders never reach the store.

use serde_json::Value;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::exchange::{
    ExportDocument, ExportKeys, Location, PendingExports, PublishReceipt, StateExchange,
};
use crate::orchestrator::{ConvergeReport, Deferred, OrderingError, Plan};

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub location: Location,
    pub keys: ExportKeys,
    /// Check the document against `keys` before uploading.
    pub validate: bool,
    /// JSON files holding stack outputs, merged in order.
    pub sources: Vec<PathBuf>,
    /// Values set directly; applied after the sources.
    pub values: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub receipt: PublishReceipt,
    pub report: ConvergeReport,
}

async fn read_source(path: PathBuf) -> Result<ExportDocument> {
    tracing::debug!(path = %path.display(), "reading stack outputs");
    let bytes = tokio::fs::read(&path).await?;
    ExportDocument::decode(&bytes).map_err(|source| Error::Source { path, source })
}

/// Declare the producer plan without running it.
pub fn producer_plan(
    exchange: &StateExchange,
    settings: &ProducerSettings,
) -> (Plan, Deferred<PublishReceipt>) {
    let mut plan = Plan::new();
    let mut pending = PendingExports::new();

    for path in &settings.sources {
        let document = plan
            .step(format!("read {}", path.display()))
            .run({
                let path = path.clone();
                move |_| read_source(path)
            });
        pending.merge(document);
    }
    for (key, value) in &settings.values {
        pending.insert_known(key, value.clone());
    }

    let receipt = pending
        .wire(plan.step("publish-exports"))
        .side_effecting()
        .run({
            let exchange = exchange.clone();
            let location = settings.location.clone();
            let keys = settings.keys.clone();
            let validate = settings.validate;
            move |ctx| async move {
                let document = pending.resolve(&ctx)?;
                if validate {
                    keys.validate(&document)?;
                }
                Ok::<_, Error>(exchange.publish(&location, &document).await?)
            }
        });

    (plan, receipt)
}

/// Run the producer plan and publish.
pub async fn publish(
    exchange: &StateExchange,
    settings: &ProducerSettings,
) -> Result<PublishOutcome> {
    let (plan, receipt) = producer_plan(exchange, settings);
    let report = plan.converge().await?;
    let receipt = receipt
        .get()
        .cloned()
        .ok_or_else(|| OrderingError::Unresolved {
            producer: "publish-exports".to_string(),
        })?;
    Ok(PublishOutcome { receipt, report })
}
