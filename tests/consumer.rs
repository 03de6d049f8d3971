// ABOUTME: Integration tests for the consumer run against in-memory fakes.
// ABOUTME: Fetch, credentials, image push, function update, gateway, and failure paths.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use stacklink::error::{Error, ErrorKind};
use stacklink::exchange::{ExportDocument, Freshness};
use stacklink::gateway::{GatewayPlan, Route};
use stacklink::orchestrator::EdgeKind;
use stacklink::pipeline::{consumer_plan, deploy};
use stacklink::resource::{EntryStatus, LedgerEntry, Lifecycle, RecordLedger};
use support::{
    FUNCTION_ARN, FakeIssuer, Harness, REGISTRY, RecordingMutation, RejectingStore,
    exports_location,
};

async fn publish(harness: &Harness, document: &ExportDocument) -> String {
    harness
        .exchange()
        .publish(&exports_location(), document)
        .await
        .unwrap()
        .digest
}

#[tokio::test]
async fn deploys_the_published_function() {
    let harness = Harness::new();
    let digest = publish(&harness, &support::full_exports()).await;

    let outcome = deploy(&harness.deps(), &harness.settings()).await.unwrap();

    let expected = format!("{REGISTRY}/app:v2");
    assert_eq!(outcome.exports_digest, digest);
    assert_eq!(outcome.image.to_string(), expected);
    assert_eq!(harness.issuer.issued.load(Ordering::SeqCst), 1);
    assert_eq!(harness.publisher.pushes(), vec![(expected.clone(), "AWS".to_string())]);

    let requests = harness.mutation.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target.as_str(), "f1");
    assert_eq!(requests[0].image.to_string(), expected);
    assert_eq!(requests[0].region.as_str(), "us-east-1");

    let entry = harness
        .ledger()
        .load(&harness.settings().resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Active);
    assert_eq!(entry.record, outcome.record);
    assert_eq!(outcome.report.side_effects, vec!["update-function"]);
    assert_eq!(harness.publisher.digest_required(), vec![false]);
}

#[tokio::test]
async fn pinned_images_use_the_digest() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;
    let mut settings = harness.settings();
    settings.image.pin_digest = true;

    let outcome = deploy(&harness.deps(), &settings).await.unwrap();
    assert_eq!(
        outcome.image.to_string(),
        format!("{REGISTRY}/app@sha256:feedface")
    );
    assert_eq!(harness.mutation.requests()[0].image, outcome.image);
    assert_eq!(harness.publisher.digest_required(), vec![true]);
}

#[tokio::test]
async fn unsaved_record_still_reports_the_update_as_fired() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;
    let mut deps = harness.deps();
    deps.ledger = RecordLedger::new(Arc::new(RejectingStore));

    let err = deploy(&deps, &harness.settings()).await.unwrap_err();

    assert_eq!(harness.mutation.calls(), 1);
    assert_eq!(err.kind(), ErrorKind::ExternalCall);
    let Error::Converge(converge) = err else {
        panic!("expected a convergence failure");
    };
    assert_eq!(converge.failed_step(), Some("update-function"));
    assert_eq!(converge.fired_side_effects(), ["update-function"]);
}

#[tokio::test]
async fn repeated_deploys_call_every_time_and_keep_the_id() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;

    let first = deploy(&harness.deps(), &harness.settings()).await.unwrap();
    let second = deploy(&harness.deps(), &harness.settings()).await.unwrap();

    assert_eq!(harness.mutation.calls(), 2);
    assert_eq!(first.record.id, second.record.id);
    assert!(first.record.same_target_state(&second.record));
}

#[tokio::test]
async fn missing_exports_abort_before_any_call() {
    let harness = Harness::new();
    let err = deploy(&harness.deps(), &harness.settings()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(harness.issuer.issued.load(Ordering::SeqCst), 0);
    assert!(harness.publisher.pushes().is_empty());
    assert_eq!(harness.mutation.calls(), 0);
}

#[tokio::test]
async fn missing_key_is_a_schema_error() {
    let harness = Harness::new();
    let mut document = ExportDocument::new();
    for (key, value) in support::full_exports().iter() {
        if key != "lambda_function_name" {
            document.insert(key, value.clone());
        }
    }
    publish(&harness, &document).await;

    let err = deploy(&harness.deps(), &harness.settings()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(harness.mutation.calls(), 0);
}

#[tokio::test]
async fn stale_exports_are_refused() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;
    let mut settings = harness.settings();
    settings.freshness = Freshness::any().digest("sha256:from-an-older-run");

    let err = deploy(&harness.deps(), &settings).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ordering);
    assert_eq!(harness.mutation.calls(), 0);
}

#[tokio::test]
async fn malformed_token_stops_before_the_push() {
    let mut harness = Harness::new();
    harness.issuer = FakeIssuer::with_decoded("no-delimiter-here");
    publish(&harness, &support::full_exports()).await;

    let err = deploy(&harness.deps(), &harness.settings()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedToken);
    assert!(harness.publisher.pushes().is_empty());
    assert_eq!(harness.mutation.calls(), 0);
}

#[tokio::test]
async fn failed_update_reports_and_keeps_the_ledger() {
    let harness = Harness::with_mutation(RecordingMutation::failing());
    publish(&harness, &support::full_exports()).await;

    let err = deploy(&harness.deps(), &harness.settings()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalCall);
    assert_eq!(harness.mutation.calls(), 1);
    assert!(
        harness
            .ledger()
            .load(&harness.settings().resource)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn gateway_is_declared_after_the_update() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;
    let mut settings = harness.settings();
    settings.gateway = Some(
        GatewayPlan::builder("app-api")
            .route(Route::parse("GET /items").unwrap())
            .route(Route::parse("POST /items/{id}").unwrap()),
    );

    let outcome = deploy(&harness.deps(), &settings).await.unwrap();
    let gateway = outcome.gateway.unwrap();
    assert_eq!(gateway.integrations.len(), 2);
    assert!(gateway.integrations[0].uri.contains(FUNCTION_ARN));
    assert_eq!(gateway.permission.function, FUNCTION_ARN);
    assert_eq!(gateway.resources.len(), 2);
    assert_eq!(outcome.report.completed.last().map(String::as_str), Some("declare-gateway"));
}

#[test]
fn plan_records_its_edges() {
    let harness = Harness::new();
    let mut settings = harness.settings();
    settings.gateway = Some(GatewayPlan::builder("app-api").route(Route::parse("GET /").unwrap()));

    let (plan, _) = consumer_plan(&harness.deps(), &settings);
    let edges = plan.edges();
    assert!(edges.contains(&("fetch-exports", "resolve-credentials", EdgeKind::Data)));
    assert!(edges.contains(&("resolve-credentials", "push-image", EdgeKind::Data)));
    assert!(edges.contains(&("push-image", "update-function", EdgeKind::Data)));
    assert!(edges.contains(&("update-function", "declare-gateway", EdgeKind::Order)));
}

#[tokio::test]
async fn removed_resource_starts_over_when_declared_again() {
    let harness = Harness::new();
    publish(&harness, &support::full_exports()).await;
    let first = deploy(&harness.deps(), &harness.settings()).await.unwrap();

    let resource = harness.settings().resource;
    let Lifecycle::Applied(applied) = harness.ledger().lifecycle(&resource).await.unwrap() else {
        panic!("resource should be applied");
    };
    let record = applied.remove().acknowledge();
    harness
        .ledger()
        .save(&LedgerEntry::detached(resource.clone(), record))
        .await
        .unwrap();
    assert_eq!(harness.mutation.calls(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = deploy(&harness.deps(), &harness.settings()).await.unwrap();
    assert_eq!(harness.mutation.calls(), 2);
    assert_ne!(second.record.id, first.record.id);
}
