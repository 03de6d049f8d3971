// ABOUTME: Consumer run: fetch exports, resolve credentials, push the image, update the function.
// ABOUTME: Every step is ordered through data or explicit edges in one plan.

use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::{self, CredentialBundle, TokenIssuer};
use crate::error::{Error, Result};
use crate::exchange::{ExportKeys, FetchedExports, Freshness, Location, StateExchange};
use crate::gateway::{GatewayPlan, GatewayPlanBuilder};
use crate::image::{ImageBuild, ImagePublisher};
use crate::orchestrator::{ConvergeReport, Deferred, Plan};
use crate::resource::{
    ExternalMutation, LedgerEntry, MalformedRequest, RecordLedger, UpdateRecord, UpdateRequest,
};
use crate::types::{FunctionName, ImageRef, RegistryId, Region, ResourceName};

/// External collaborators of a consumer run.
#[derive(Clone)]
pub struct ConsumerDeps {
    pub exchange: StateExchange,
    pub issuer: Arc<dyn TokenIssuer>,
    pub publisher: Arc<dyn ImagePublisher>,
    pub mutation: Arc<dyn ExternalMutation>,
    pub ledger: RecordLedger,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Overrides the repository URL from the exports.
    pub repository: Option<String>,
    pub tag: String,
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    pub pin_digest: bool,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub location: Location,
    pub freshness: Freshness,
    pub keys: ExportKeys,
    pub region: Region,
    pub image: ImageSettings,
    pub resource: ResourceName,
    pub gateway: Option<GatewayPlanBuilder>,
}

/// Deferred outputs of the consumer plan, resolved once it converges.
#[derive(Debug, Clone)]
pub struct ConsumerOutputs {
    pub exports: Deferred<FetchedExports>,
    pub credentials: Deferred<CredentialBundle>,
    pub image: Deferred<ImageRef>,
    pub record: Deferred<UpdateRecord>,
    pub gateway: Option<Deferred<GatewayPlan>>,
}

/// What a successful consumer run did.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub exports_digest: String,
    pub image: ImageRef,
    pub record: UpdateRecord,
    pub gateway: Option<GatewayPlan>,
    pub report: ConvergeReport,
}

fn function_name(raw: &str) -> Result<FunctionName> {
    FunctionName::new(raw).map_err(|e| MalformedRequest::from(e).into())
}

/// Declare the consumer plan without running it.
pub fn consumer_plan(deps: &ConsumerDeps, settings: &ConsumerSettings) -> (Plan, ConsumerOutputs) {
    let mut plan = Plan::new();

    let exports = plan.step("fetch-exports").run({
        let exchange = deps.exchange.clone();
        let location = settings.location.clone();
        let freshness = settings.freshness.clone();
        move |_| async move {
            let fetched = exchange.fetch_checked(&location, &freshness).await?;
            Ok::<_, Error>(fetched)
        }
    });

    let credentials = plan.step("resolve-credentials").reads(&exports).run({
        let exports = exports.clone();
        let issuer = Arc::clone(&deps.issuer);
        let key = settings.keys.registry_id.clone();
        move |ctx| async move {
            let document = &ctx.read(&exports)?.document;
            let registry = RegistryId::new(document.require_str(&key)?);
            let token = issuer.issue(&registry).await?;
            let mut bundle = credentials::resolve(&token.server, &token.token)?;
            bundle.expires_at = token.expires_at;
            Ok::<_, Error>(bundle)
        }
    });

    let image = plan
        .step("push-image")
        .reads(&exports)
        .reads(&credentials)
        .run({
            let exports = exports.clone();
            let credentials = credentials.clone();
            let publisher = Arc::clone(&deps.publisher);
            let key = settings.keys.repository_url.clone();
            let settings = settings.image.clone();
            move |ctx| async move {
                let repository = match settings.repository {
                    Some(ref repository) => repository.clone(),
                    None => ctx.read(&exports)?.document.require_str(&key)?.to_string(),
                };
                let build = ImageBuild {
                    image: ImageRef::for_repository(&repository, &settings.tag)
                        .map_err(MalformedRequest::from)?,
                    context: settings.context.clone(),
                    dockerfile: settings.dockerfile.clone(),
                    require_digest: settings.pin_digest,
                };
                let pushed = publisher.publish(&build, ctx.read(&credentials)?).await?;
                Ok::<_, Error>(pushed.deploy_reference(settings.pin_digest))
            }
        });

    let record = plan
        .step("update-function")
        .reads(&exports)
        .reads(&image)
        .side_effecting()
        .run({
            let exports = exports.clone();
            let image = image.clone();
            let mutation = Arc::clone(&deps.mutation);
            let ledger = deps.ledger.clone();
            let key = settings.keys.function_name.clone();
            let region = settings.region.clone();
            let resource = settings.resource.clone();
            move |ctx| async move {
                let target = function_name(ctx.read(&exports)?.document.require_str(&key)?)?;
                let request = UpdateRequest::new(target, ctx.read(&image)?.clone(), region);

                let lifecycle = ledger.lifecycle(&resource).await?;
                let applied = lifecycle
                    .apply(mutation.as_ref(), &request)
                    .await
                    .map_err(|(_, e)| e)?;
                let record = applied.into_record();
                ledger
                    .save(&LedgerEntry::active(resource, record.clone()))
                    .await
                    .map_err(|source| Error::Unrecorded {
                        target: request.target.clone(),
                        image: request.image.clone(),
                        source,
                    })?;
                Ok::<_, Error>(record)
            }
        });

    let gateway = settings.gateway.clone().map(|builder| {
        plan.step("declare-gateway")
            .reads(&exports)
            .after(&record)
            .run({
                let exports = exports.clone();
                let key = settings.keys.function_arn.clone();
                let region = settings.region.clone();
                move |ctx| async move {
                    let arn = function_name(ctx.read(&exports)?.document.require_str(&key)?)?;
                    Ok::<_, Error>(builder.build(&region, &arn)?)
                }
            })
    });

    let outputs = ConsumerOutputs {
        exports,
        credentials,
        image,
        record,
        gateway,
    };
    (plan, outputs)
}

/// Run the consumer plan to completion. The first failure aborts the run.
pub async fn deploy(deps: &ConsumerDeps, settings: &ConsumerSettings) -> Result<DeployOutcome> {
    let (plan, outputs) = consumer_plan(deps, settings);
    let report = plan.converge().await?;

    let unresolved = |label: &str| crate::orchestrator::OrderingError::Unresolved {
        producer: label.to_string(),
    };
    let exports = outputs.exports.get().ok_or_else(|| unresolved("fetch-exports"))?;
    let image = outputs.image.get().ok_or_else(|| unresolved("push-image"))?;
    let record = outputs.record.get().ok_or_else(|| unresolved("update-function"))?;
    let gateway = match outputs.gateway {
        Some(ref gateway) => Some(
            gateway
                .get()
                .ok_or_else(|| unresolved("declare-gateway"))?
                .clone(),
        ),
        None => None,
    };

    Ok(DeployOutcome {
        exports_digest: exports.digest.clone(),
        image: image.clone(),
        record: record.clone(),
        gateway,
        report,
    })
}
