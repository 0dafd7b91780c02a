//! End-to-end run semantics over the in-memory store.

use std::sync::Arc;

use serde_json::json;

use waypoint_core::gateway::StateGateway;
use waypoint_core::storage::MemoryStateStore;
use waypoint_core::{Application, RunError};
use waypoint_types::application::{
    ActionConfiguration, ApplicationConfiguration, ApplicationGlobals,
};
use waypoint_types::error::FailureKind;
use waypoint_types::heap::PointerState;

fn identity() -> ApplicationGlobals {
    ApplicationGlobals::new("fakeAppId", "fakeUserId")
}

fn node(action_type: &str, id: &str) -> ApplicationConfiguration {
    ApplicationConfiguration::new(action_type, ActionConfiguration::new(id))
}

fn fail(id: &str, kind: &str) -> ApplicationConfiguration {
    ApplicationConfiguration::new(
        "Fail",
        ActionConfiguration::new(id)
            .with_setting("kind", json!(kind))
            .with_setting("message", json!(format!("{id} failed"))),
    )
}

fn setup(conf: &ApplicationConfiguration) -> (Application<MemoryStateStore>, StateGateway<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let app = Application::from_config(conf, store.clone()).unwrap();
    (app, StateGateway::new(store, &identity()))
}

#[tokio::test]
async fn outputs_can_be_used_as_inputs() {
    let conf = ApplicationConfiguration::new(
        "Echo",
        ActionConfiguration::new("a1").with_setting("constants", json!({ "text": "Hola" })),
    )
    .on_success(ApplicationConfiguration::new(
        "Echo",
        ActionConfiguration::new("a2").with_input("x", "GET:a1:text"),
    ));
    let (app, _) = setup(&conf);

    let heap = app.run(identity(), None).await.unwrap();
    assert_eq!(heap.output("a2").unwrap()["x"], json!("Hola"));
    assert_eq!(heap.pointer.as_deref(), Some(""));
}

#[tokio::test]
async fn test_action_chain_passes_outputs() {
    let conf = node("TestAction", "test-action-1")
        .on_success(ApplicationConfiguration::new(
            "TestAction",
            ActionConfiguration::new("test-action-2")
                .with_input("myInput", "GET:test-action-1:someText"),
        ))
        .on_failure(node("TestAction", "test-action-fail"));
    let (app, _) = setup(&conf);

    let heap = app.run(identity(), None).await.unwrap();
    let second = heap.output("test-action-2").unwrap();
    assert_eq!(second["inputGivenToAction"]["myInput"], json!("Hola"));
    assert_eq!(heap.pointer.as_deref(), Some(""));
    assert_eq!(heap.raw_output("test-action-fail"), None);
}

#[tokio::test]
async fn terminal_pointer_is_idempotent() {
    let conf = node("Counter", "root").on_success(node("Counter", "leaf"));
    let (app, _) = setup(&conf);

    let first = app.run(identity(), None).await.unwrap();
    assert_eq!(first.pointer_state(), PointerState::Completed);

    // The next run starts again at the root.
    let second = app.run(identity(), None).await.unwrap();
    assert_eq!(second.pointer_state(), PointerState::Completed);
    assert_eq!(second.output("root").unwrap()["count"], json!(2.0));
    assert_eq!(second.output("leaf").unwrap()["count"], json!(2.0));
}

#[tokio::test]
async fn actions_are_namespace_isolated() {
    let conf = node("Counter", "left").on_success(node("Counter", "right"));
    let (app, gateway) = setup(&conf);
    app.run(identity(), None).await.unwrap();

    gateway
        .increment_variable("left", "count", 10.0)
        .await
        .unwrap();
    assert_eq!(gateway.get_numeric_variable("left", "count").await.unwrap(), Some(11.0));
    assert_eq!(gateway.get_numeric_variable("right", "count").await.unwrap(), Some(1.0));
}

#[tokio::test]
async fn run_resumes_at_persisted_pointer() {
    let conf = node("TestAction", "R")
        .on_success(node("TestAction", "S1").on_success(node("TestAction", "S2")));
    let (app, gateway) = setup(&conf);
    gateway.set_pointer("S2").await.unwrap();

    let heap = app.run(identity(), None).await.unwrap();
    let graph = app.graph();
    assert!(!graph.node("R").unwrap().was_invoked());
    assert!(!graph.node("S1").unwrap().was_invoked());
    assert!(graph.node("S2").unwrap().was_invoked());
    assert!(heap.output("R").is_none());
    assert!(heap.output("S2").is_some());
    assert_eq!(heap.pointer.as_deref(), Some(""));
}

#[tokio::test]
async fn failure_edge_redirects_and_absorbs_error() {
    let conf = fail("F", "BAD_REQUEST")
        .on_success(node("TestAction", "never"))
        .on_failure(node("TestAction", "H"));
    let (app, _) = setup(&conf);

    let heap = app.run(identity(), None).await.unwrap();
    let graph = app.graph();
    assert!(graph.node("F").unwrap().was_invoked());
    assert!(graph.node("H").unwrap().was_invoked());
    assert!(!graph.node("never").unwrap().was_invoked());
    assert!(heap.output("H").is_some());
    assert!(heap.output("F").is_none());
    assert_eq!(heap.pointer.as_deref(), Some(""));
}

#[tokio::test]
async fn unrecoverable_failure_preserves_pointer() {
    let conf = node("TestAction", "start").on_success(fail("F", "BAD_REQUEST"));
    let (app, gateway) = setup(&conf);

    let err = app.run(identity(), None).await.unwrap_err();
    match &err {
        RunError::Action { action_id, source } => {
            assert_eq!(action_id, "F");
            assert_eq!(source.kind, FailureKind::BadRequest);
            assert_eq!(source.message, "F failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(gateway.get_pointer().await.unwrap().as_deref(), Some("F"));

    // A retry resumes at the failed node, not the root.
    let _ = app.run(identity(), None).await.unwrap_err();
    assert_eq!(gateway.get_pointer().await.unwrap().as_deref(), Some("F"));
}

#[tokio::test]
async fn failure_kind_propagates_unchanged() {
    let (app, _) = setup(&fail("F", "MISCONFIGURATION"));
    let err = app.run(identity(), None).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Misconfiguration);
}

#[tokio::test]
async fn get_precondition_fails_before_invoke() {
    // Y reads X's output, but X sits on the failure branch and never ran.
    let conf = node("TestAction", "root")
        .on_success(ApplicationConfiguration::new(
            "TestAction",
            ActionConfiguration::new("Y").with_input("v", "GET:X:field"),
        ))
        .on_failure(node("TestAction", "X"));
    let (app, gateway) = setup(&conf);

    let err = app.run(identity(), None).await.unwrap_err();
    match &err {
        RunError::Action { action_id, source } => {
            assert_eq!(action_id, "Y");
            assert_eq!(source.kind, FailureKind::Misconfiguration);
            assert!(source.message.contains("X:field"), "{}", source.message);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!app.graph().node("Y").unwrap().was_invoked());
    assert_eq!(gateway.get_pointer().await.unwrap().as_deref(), Some("Y"));
}

#[tokio::test]
async fn payload_flows_into_verify_payload() {
    let conf = ApplicationConfiguration::new(
        "VerifyPayload",
        ActionConfiguration::new("verify")
            .with_input("email", "GLOBAL:email")
            .with_setting(
                "schema",
                json!({
                    "type": "object",
                    "properties": { "email": { "type": "string", "minLength": 3 } },
                    "required": ["email"]
                }),
            ),
    )
    .on_failure(ApplicationConfiguration::new(
        "Echo",
        ActionConfiguration::new("rejected").with_setting("constants", json!({ "ok": false })),
    ));
    let (app, _) = setup(&conf);

    let payload = json!({ "email": "a@b.c" }).as_object().cloned();
    let heap = app.run(identity(), payload).await.unwrap();
    assert_eq!(heap.output("verify").unwrap()["email"], json!("a@b.c"));
    assert!(heap.output("rejected").is_none());

    let heap = app.run(ApplicationGlobals::new("fakeAppId", "other"), None).await.unwrap();
    assert!(heap.output("verify").is_none());
    assert_eq!(heap.output("rejected").unwrap()["ok"], json!(false));
}
