mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{descriptor, Behaviour, Detective, Recorder, Sleeper};
use omnitide::{
    dispatch, Capabilities, Capability, DispatchResult, Dispatcher, Outcome, Unit, UnitKind,
    UnitRegistry, UnitResult,
};
use pretty_assertions::assert_eq;

fn agents() -> UnitRegistry {
    let registry = UnitRegistry::new(UnitKind::Agent);
    registry
        .register(descriptor(
            "Sherlock Holmes",
            UnitKind::Agent,
            Arc::new(Detective {
                name: "Sherlock Holmes",
            }),
        ))
        .unwrap();
    registry
        .register(descriptor("sleeper", UnitKind::Agent, Arc::new(Sleeper)))
        .unwrap();
    registry
        .register(descriptor(
            "panicky",
            UnitKind::Agent,
            Arc::new(Recorder::failing(Capability::ExecuteTask, Behaviour::Panic)),
        ))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_success_contains_task_text() {
    let result = dispatch(&agents(), "Sherlock Holmes", "find the leak").await;

    match &result {
        DispatchResult::Success { unit_name, result } => {
            assert_eq!(unit_name, "Sherlock Holmes");
            assert!(!result.is_empty());
            assert!(result.contains("find the leak"));
        }
        other => panic!("unexpected dispatch result: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_unit_is_not_found() {
    let result = dispatch(&agents(), "Nonexistent", "x").await;
    assert_eq!(
        result,
        DispatchResult::UnitNotFound {
            unit_name: "Nonexistent".to_string()
        }
    );
    assert_eq!(result.result_text(), "Agent not found");
}

#[tokio::test]
async fn test_unit_without_execute_task_is_unsupported() {
    for task in ["", "sleep", "find the leak"] {
        let result = dispatch(&agents(), "sleeper", task).await;
        assert_eq!(
            result,
            DispatchResult::UnsupportedCapability {
                unit_name: "sleeper".to_string(),
                capability: Capability::ExecuteTask,
            }
        );
        assert_eq!(result.result_text(), "Task execution not supported");
    }
}

#[tokio::test]
async fn test_panicking_task_becomes_task_failed() {
    let result = dispatch(&agents(), "panicky", "boom").await;
    assert_eq!(result.outcome(), Outcome::TaskFailed);
    assert!(result.result_text().contains("simulated panic"));
}

struct Stalled;

#[async_trait]
impl Unit for Stalled {
    fn display_name(&self) -> String {
        "Stalled".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::from(Capability::ExecuteTask)
    }

    async fn execute_task(&self, _task: &str) -> UnitResult<String> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_timeout_bounds_a_stalled_unit() {
    let registry = agents();
    registry
        .register(descriptor("stalled", UnitKind::Agent, Arc::new(Stalled)))
        .unwrap();

    let dispatcher = Dispatcher::new(Some(Duration::from_millis(20)));
    let result = dispatcher.dispatch(&registry, "stalled", "wait").await;
    assert_eq!(result.outcome(), Outcome::TaskFailed);
    assert!(result.result_text().contains("timed out"));

    // without a timeout the call does not come back on its own
    let unbounded = tokio::time::timeout(
        Duration::from_millis(50),
        dispatch(&registry, "stalled", "wait"),
    )
    .await;
    assert!(unbounded.is_err());
}

#[tokio::test]
async fn test_stalled_unit_does_not_block_others() {
    let registry = agents();
    registry
        .register(descriptor("stalled", UnitKind::Agent, Arc::new(Stalled)))
        .unwrap();

    let stuck = {
        let registry = registry.clone();
        tokio::spawn(async move { dispatch(&registry, "stalled", "forever").await })
    };
    let result = dispatch(&registry, "Sherlock Holmes", "the hound").await;
    assert!(result.is_success());
    stuck.abort();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_includes_waiting_behind_a_stalled_call() {
    let registry = agents();
    registry
        .register(descriptor("stalled", UnitKind::Agent, Arc::new(Stalled)))
        .unwrap();
    let dispatcher = Dispatcher::new(Some(Duration::from_millis(100)));
    let started = tokio::time::Instant::now();

    let calls = (0..2).map(|i| {
        let registry = registry.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch(&registry, "stalled", &format!("wait {i}"))
                .await
        })
    });
    for call in futures::future::join_all(calls).await {
        assert_eq!(call.unwrap().outcome(), Outcome::TaskFailed);
    }
    assert!(started.elapsed() < Duration::from_millis(150));
}
