// ABOUTME: Integration tests for plan declaration and convergence.
// ABOUTME: Ordering through edges, refused reads, and abort reporting.

mod support;

use parking_lot::Mutex;
use std::sync::Arc;

use stacklink::error::{Error, ErrorKind};
use stacklink::exchange::{Location, StoreError};
use stacklink::orchestrator::*;
use stacklink::resource::LedgerError;
use stacklink::types::{FunctionName, ImageRef};

fn journal() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn steps_run_after_their_upstream() {
    support::init_tracing();
    let log = journal();
    let mut plan = Plan::new();

    let a = plan.step("a").run({
        let log = log.clone();
        move |_| async move {
            log.lock().push("a");
            Ok(2u32)
        }
    });
    let b = plan.step("b").reads(&a).run({
        let (log, a) = (log.clone(), a.clone());
        move |ctx| async move {
            let doubled = ctx.read(&a)? * 2;
            log.lock().push("b");
            Ok::<_, Error>(doubled)
        }
    });
    let _c = plan.step("c").after(&b).run({
        let log = log.clone();
        move |_| async move {
            log.lock().push("c");
            Ok(())
        }
    });

    let report = plan.converge().await.unwrap();
    assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    assert_eq!(report.completed, vec!["a", "b", "c"]);
    assert!(report.side_effects.is_empty());
    assert_eq!(b.get(), Some(&4));
}

#[tokio::test]
async fn reading_without_an_edge_is_refused() {
    let mut plan = Plan::new();
    let a = plan.step("a").run(|_| async { Ok(1u32) });
    let _b = plan.step("b").run({
        let a = a.clone();
        move |ctx| async move { Ok::<_, Error>(*ctx.read(&a)?) }
    });

    let err = plan.converge().await.unwrap_err();
    assert_eq!(err.failed_step(), Some("b"));
    let ConvergeError::StepFailed { source, .. } = err else {
        panic!("expected a step failure");
    };
    assert_eq!(source.kind(), ErrorKind::Ordering);
    assert!(matches!(
        *source,
        Error::Ordering(OrderingError::MissingEdge { .. })
    ));
}

#[tokio::test]
async fn transitive_ancestors_may_be_read() {
    let mut plan = Plan::new();
    let a = plan.step("a").run(|_| async { Ok("root".to_string()) });
    let b = plan.step("b").reads(&a).run(|_| async { Ok(()) });
    let c = plan.step("c").after(&b).run({
        let a = a.clone();
        move |ctx| async move { Ok::<_, Error>(ctx.read(&a)?.len()) }
    });

    plan.converge().await.unwrap();
    assert_eq!(c.get(), Some(&4));
}

#[tokio::test]
async fn failure_reports_fired_side_effects() {
    let mut plan = Plan::new();
    let pushed = plan
        .step("push")
        .side_effecting()
        .run(|_| async { Ok(()) });
    let _update = plan.step("update").after(&pushed).run(|_| async {
        Err::<(), _>(Error::InvalidConfig("boom".to_string()))
    });

    let err = plan.converge().await.unwrap_err();
    assert_eq!(err.failed_step(), Some("update"));
    assert_eq!(err.fired_side_effects(), ["push".to_string()]);
}

#[tokio::test]
async fn failed_mutation_is_not_counted_as_fired() {
    let mut plan = Plan::new();
    let _update = plan.step("update").side_effecting().run(|_| async {
        Err::<(), _>(Error::InvalidConfig("rejected".to_string()))
    });

    let err = plan.converge().await.unwrap_err();
    assert!(err.fired_side_effects().is_empty());
}

#[tokio::test]
async fn mutation_that_landed_before_failing_is_counted_as_fired() {
    let mut plan = Plan::new();
    let _update = plan.step("update").side_effecting().run(|_| async {
        let location = Location::new("ledger", "records/f1.json")?;
        Err::<(), _>(Error::Unrecorded {
            target: FunctionName::new("f1").unwrap(),
            image: ImageRef::parse("repo:v2").unwrap(),
            source: LedgerError::Store(StoreError::NotFound(location)),
        })
    });

    let err = plan.converge().await.unwrap_err();
    assert_eq!(err.failed_step(), Some("update"));
    assert_eq!(err.fired_side_effects(), ["update".to_string()]);
}

#[tokio::test]
async fn downstream_steps_do_not_run_after_a_failure() {
    let log = journal();
    let mut plan = Plan::new();
    let a = plan
        .step("a")
        .run(|_| async { Err::<(), _>(Error::InvalidConfig("nope".to_string())) });
    let _b = plan.step("b").after(&a).run({
        let log = log.clone();
        move |_| async move {
            log.lock().push("b");
            Ok(())
        }
    });

    assert!(plan.converge().await.is_err());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let mut plan = Plan::new();
    let _a = plan.step("same").run(|_| async { Ok(()) });
    let _b = plan.step("same").run(|_| async { Ok(()) });
    assert!(matches!(
        plan.converge().await,
        Err(ConvergeError::DuplicateStep { .. })
    ));
}

#[tokio::test]
async fn values_from_another_plan_are_rejected() {
    let mut first = Plan::new();
    let outside = first.step("outside").run(|_| async { Ok(1u8) });

    let mut second = Plan::new();
    let _inside = second.step("inside").reads(&outside).run(|_| async { Ok(()) });
    assert!(matches!(
        second.converge().await,
        Err(ConvergeError::ForeignDependency { .. })
    ));
}

#[tokio::test]
async fn known_values_need_no_edge() {
    let mut plan = Plan::new();
    let region = Deferred::known("region", "r1".to_string());
    let echoed = plan.step("echo").run({
        let region = region.clone();
        move |ctx| async move { Ok::<_, Error>(ctx.read(&region)?.clone()) }
    });
    plan.converge().await.unwrap();
    assert_eq!(echoed.get().map(String::as_str), Some("r1"));
}
