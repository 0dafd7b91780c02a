//! The orchestrator.
//!
//! `Application` walks a compiled `ActionGraph` for one (application, user)
//! identity at a time. Each step reads the persisted pointer, resolves the
//! node's input, invokes it, persists its output and moves the pointer
//! along the success or failure edge. Because the pointer is written after
//! every step, a run interrupted at any point resumes from the last node
//! whose predecessor completed.
//!
//! Steps are strictly sequential: a node's output write completes before
//! the pointer write naming the next node, which completes before the next
//! pointer read.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use waypoint_types::application::{ApplicationConfiguration, ApplicationGlobals};
use waypoint_types::error::{ActionError, FailureKind, RepositoryError};
use waypoint_types::heap::{HeapSnapshot, PointerState};

use crate::action::{ActionOutput, ActionScope, Invoke};
use crate::context::RunContext;
use crate::gateway::StateGateway;
use crate::graph::{ActionGraph, ActionNode, GraphBuilder, GraphError};
use crate::input::resolve_input;
use crate::storage::StateStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a run stopped without completing.
#[derive(Debug, Error)]
pub enum RunError {
    /// A step failed and its node has no failure edge. The pointer still
    /// names the failed node.
    #[error("action '{action_id}' failed: {source}")]
    Action {
        action_id: String,
        #[source]
        source: ActionError,
    },

    /// The stored pointer names a node this graph does not have.
    #[error("pointer names unknown action '{0}'")]
    UnknownPointer(String),

    /// Reading or writing run state failed.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl RunError {
    /// The failure kind propagated to the caller.
    pub fn kind(&self) -> FailureKind {
        match self {
            RunError::Action { source, .. } => source.kind,
            RunError::UnknownPointer(_) => FailureKind::Misconfiguration,
            RunError::Storage(_) => FailureKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// A compiled graph bound to a state store.
pub struct Application<S: StateStore> {
    graph: Arc<ActionGraph>,
    store: Arc<S>,
}

impl<S: StateStore> Clone for Application<S> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StateStore> Application<S> {
    pub fn new(graph: Arc<ActionGraph>, store: Arc<S>) -> Self {
        Self { graph, store }
    }

    /// Compile a configuration tree and bind it to `store`.
    pub fn from_config(conf: &ApplicationConfiguration, store: Arc<S>) -> Result<Self, GraphError> {
        Ok(Self::new(Arc::new(GraphBuilder::compile(conf)?), store))
    }

    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    fn gateway(&self, identity: &ApplicationGlobals) -> StateGateway<S> {
        StateGateway::new(Arc::clone(&self.store), identity)
    }

    /// Run the graph for one identity until it completes or fails.
    ///
    /// `payload` is merged into the globals `GLOBAL:` sources read from.
    /// On completion the pointer is reset to `""` and the heap is returned.
    pub async fn run(
        &self,
        identity: ApplicationGlobals,
        payload: Option<Map<String, Value>>,
    ) -> Result<HeapSnapshot, RunError> {
        let ctx = RunContext::new(identity, payload);
        let gateway = self.gateway(&ctx.identity);
        tracing::info!(
            run_id = %ctx.run_id,
            application_id = gateway.application_id(),
            user_id = gateway.user_id(),
            "run started"
        );

        loop {
            let node = self.current_node(&gateway).await?;
            let outcome = self.step(node, &ctx, &gateway).await?;

            match outcome {
                Ok(output) => {
                    if let Some(output) = output {
                        ActionScope::new(node.id(), &gateway)
                            .set_output(&output)
                            .await?;
                    }
                    match node.success_edge() {
                        Some(next) => gateway.set_pointer(next).await?,
                        None => {
                            gateway.set_pointer("").await?;
                            let heap = gateway.get_heap(&self.graph).await?;
                            tracing::info!(
                                run_id = %ctx.run_id,
                                last_action = node.id(),
                                "run completed"
                            );
                            return Ok(heap);
                        }
                    }
                }
                Err(err) => match node.failure_edge() {
                    Some(next) => {
                        tracing::warn!(
                            run_id = %ctx.run_id,
                            action_id = node.id(),
                            kind = %err.kind,
                            error = %err.message,
                            on_failure = next,
                            "action failed, following failure edge"
                        );
                        gateway.set_pointer(next).await?;
                    }
                    None => {
                        tracing::error!(
                            run_id = %ctx.run_id,
                            action_id = node.id(),
                            kind = %err.kind,
                            error = %err.message,
                            "action failed with no failure edge"
                        );
                        return Err(RunError::Action {
                            action_id: node.id().to_string(),
                            source: err,
                        });
                    }
                },
            }
        }
    }

    /// Resolve the node the stored pointer designates.
    async fn current_node(&self, gateway: &StateGateway<S>) -> Result<&ActionNode, RunError> {
        let pointer = gateway.get_pointer().await?;
        match PointerState::from_raw(pointer.as_deref()) {
            PointerState::NeverStarted | PointerState::Completed => {
                tracing::debug!(root = self.graph.root_id(), "starting at root");
                Ok(self.graph.root())
            }
            PointerState::At(id) => {
                tracing::debug!(action_id = %id, "resuming");
                self.graph.node(&id).ok_or(RunError::UnknownPointer(id))
            }
        }
    }

    /// Resolve input and invoke one node.
    ///
    /// The inner error is a step failure that a failure edge may absorb;
    /// input resolution errors of any kind land there. The outer error is
    /// reserved for the orchestrator's own pointer and output writes.
    async fn step(
        &self,
        node: &ActionNode,
        ctx: &RunContext,
        gateway: &StateGateway<S>,
    ) -> Result<Result<Option<ActionOutput>, ActionError>, RunError> {
        let input = match resolve_input(&node.config().input_sources, ctx, &self.graph, gateway).await
        {
            Ok(input) => input,
            Err(e) => return Ok(Err(e.into())),
        };
        let input_json = Value::Object(input.clone());
        tracing::debug!(
            run_id = %ctx.run_id,
            action_id = node.id(),
            action_type = %node.action_type(),
            input = %input_json,
            "invoking action"
        );

        let scope = ActionScope::new(node.id(), gateway);
        let result = node.action().invoke(input, &scope).await;
        node.mark_invoked();

        if let Ok(Some(output)) = &result {
            let output_json = Value::Object(output.clone());
            tracing::debug!(
                run_id = %ctx.run_id,
                action_id = node.id(),
                output = %output_json,
                "action produced output"
            );
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Inspection and manual control
    // -----------------------------------------------------------------------

    /// Every node's output and the pointer, without running anything.
    pub async fn heap(&self, identity: &ApplicationGlobals) -> Result<HeapSnapshot, RunError> {
        Ok(self.gateway(identity).get_heap(&self.graph).await?)
    }

    pub async fn pointer(&self, identity: &ApplicationGlobals) -> Result<PointerState, RunError> {
        let raw = self.gateway(identity).get_pointer().await?;
        Ok(PointerState::from_raw(raw.as_deref()))
    }

    /// Move the pointer so the next run resumes at `action_id`.
    pub async fn set_pointer(
        &self,
        identity: &ApplicationGlobals,
        action_id: &str,
    ) -> Result<(), RunError> {
        if !self.graph.contains(action_id) {
            return Err(RunError::UnknownPointer(action_id.to_string()));
        }
        self.gateway(identity).set_pointer(action_id).await?;
        Ok(())
    }

    /// Make the next run start at the root.
    pub async fn reset_pointer(&self, identity: &ApplicationGlobals) -> Result<(), RunError> {
        self.gateway(identity).set_pointer("").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_types::application::ActionConfiguration;

    use crate::storage::MemoryStateStore;

    fn identity() -> ApplicationGlobals {
        ApplicationGlobals::new("app", "u1")
    }

    fn node(action_type: &str, id: &str) -> ApplicationConfiguration {
        ApplicationConfiguration::new(action_type, ActionConfiguration::new(id))
    }

    fn app(conf: &ApplicationConfiguration) -> (Application<MemoryStateStore>, Arc<MemoryStateStore>) {
        let store = Arc::new(MemoryStateStore::new());
        (Application::from_config(conf, store.clone()).unwrap(), store)
    }

    #[tokio::test]
    async fn test_single_node_completes() {
        let (app, _) = app(&node("TestAction", "only"));
        let heap = app.run(identity(), None).await.unwrap();

        assert_eq!(heap.pointer.as_deref(), Some(""));
        assert_eq!(heap.output("only").unwrap()["someText"], json!("Hola"));
        assert!(app.graph().root().was_invoked());
    }

    #[tokio::test]
    async fn test_empty_output_is_persisted() {
        let conf = node("TestAction", "r").on_success(node("Echo", "quiet"));
        let (app, _) = app(&conf);
        let heap = app.run(identity(), None).await.unwrap();
        // Echo with no constants and no input still outputs an empty object.
        assert_eq!(heap.raw_output("quiet"), Some("{}"));
        assert!(heap.heap.contains_key("r"));
    }

    #[tokio::test]
    async fn test_input_failure_is_a_step_failure() {
        let conf = ApplicationConfiguration::new(
            "Echo",
            ActionConfiguration::new("e").with_input("x", "GET:later:field"),
        )
        .on_success(node("TestAction", "later"))
        .on_failure(node("TestAction", "recover"));
        let (app, _) = app(&conf);

        let heap = app.run(identity(), None).await.unwrap();
        let graph = app.graph();
        assert!(!graph.node("e").unwrap().was_invoked());
        assert!(graph.node("recover").unwrap().was_invoked());
        assert!(!graph.node("later").unwrap().was_invoked());
        assert!(heap.output("recover").is_some());
        assert!(heap.output("e").is_none());
    }

    #[tokio::test]
    async fn test_unknown_pointer_is_fatal() {
        let (app, store) = app(&node("TestAction", "r"));
        StateGateway::new(store, &identity())
            .set_pointer("ghost")
            .await
            .unwrap();

        let err = app.run(identity(), None).await.unwrap_err();
        assert!(matches!(&err, RunError::UnknownPointer(id) if id == "ghost"));
        assert_eq!(err.kind(), FailureKind::Misconfiguration);
    }

    #[tokio::test]
    async fn test_pointer_controls() {
        let conf = node("TestAction", "r").on_success(node("TestAction", "s"));
        let (app, _) = app(&conf);
        let id = identity();

        assert_eq!(app.pointer(&id).await.unwrap(), PointerState::NeverStarted);
        app.set_pointer(&id, "s").await.unwrap();
        assert_eq!(app.pointer(&id).await.unwrap(), PointerState::At("s".to_string()));

        let err = app.set_pointer(&id, "nope").await.unwrap_err();
        assert!(matches!(err, RunError::UnknownPointer(_)));

        app.reset_pointer(&id).await.unwrap();
        assert_eq!(app.pointer(&id).await.unwrap(), PointerState::Completed);
    }

    #[tokio::test]
    async fn test_heap_without_running() {
        let conf = node("TestAction", "r").on_success(node("TestAction", "s"));
        let (app, _) = app(&conf);
        let heap = app.heap(&identity()).await.unwrap();

        assert_eq!(heap.pointer, None);
        assert_eq!(heap.heap.len(), 2);
        assert!(heap.heap.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_counter_persists_across_runs() {
        let (app, _) = app(&node("Counter", "hits"));
        let first = app.run(identity(), None).await.unwrap();
        let second = app.run(identity(), None).await.unwrap();

        assert_eq!(first.output("hits").unwrap()["count"], json!(1.0));
        assert_eq!(second.output("hits").unwrap()["count"], json!(2.0));

        let other = app
            .run(ApplicationGlobals::new("app", "u2"), None)
            .await
            .unwrap();
        assert_eq!(other.output("hits").unwrap()["count"], json!(1.0));
    }

    /// `X -> Y (Echo, v = GET:X:someText)` with X's stored output unreadable.
    fn corrupt_predecessor(on_failure: Option<ApplicationConfiguration>) -> ApplicationConfiguration {
        let mut y = ApplicationConfiguration::new(
            "Echo",
            ActionConfiguration::new("Y").with_input("v", "GET:X:someText"),
        );
        if let Some(handler) = on_failure {
            y = y.on_failure(handler);
        }
        node("TestAction", "X").on_success(y)
    }

    async fn corrupt_output_of_x(store: &Arc<MemoryStateStore>) -> StateGateway<MemoryStateStore> {
        let gateway = StateGateway::new(Arc::clone(store), &identity());
        gateway
            .set_string_variable("X", "output", "{not json", None)
            .await
            .unwrap();
        gateway.set_pointer("Y").await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_unreadable_input_follows_failure_edge() {
        let (app, store) = app(&corrupt_predecessor(Some(node("TestAction", "H"))));
        corrupt_output_of_x(&store).await;

        let heap = app.run(identity(), None).await.unwrap();

        assert!(!app.graph().node("Y").unwrap().was_invoked());
        assert!(app.graph().node("H").unwrap().was_invoked());
        assert_eq!(heap.pointer.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unreadable_input_without_failure_edge_is_internal() {
        let (app, store) = app(&corrupt_predecessor(None));
        let gateway = corrupt_output_of_x(&store).await;

        let err = app.run(identity(), None).await.unwrap_err();

        match &err {
            RunError::Action { action_id, source } => {
                assert_eq!(action_id, "Y");
                assert!(source.message.contains("corrupt output for action 'X'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), FailureKind::Internal);
        assert!(!app.graph().node("Y").unwrap().was_invoked());
        assert_eq!(gateway.get_pointer().await.unwrap().as_deref(), Some("Y"));
    }

    #[test]
    fn test_run_error_kind() {
        let err = RunError::Action {
            action_id: "a".to_string(),
            source: ActionError::bad_request("bad"),
        };
        assert_eq!(err.kind(), FailureKind::BadRequest);
        assert_eq!(err.to_string(), "action 'a' failed: BAD_REQUEST: bad");
        assert_eq!(
            RunError::Storage(RepositoryError::Connection).kind(),
            FailureKind::Internal
        );
    }
}
