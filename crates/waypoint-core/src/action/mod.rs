//! The action contract and the closed registry of action implementations.
//!
//! An action receives its resolved input and an [`ActionScope`] bound to its
//! own namespace, and returns an optional flat JSON object as output. The
//! orchestrator persists that output; actions never write it themselves.

pub mod counter;
pub mod echo;
pub mod fail;
pub mod schema;
pub mod scope;
pub mod test_action;
pub mod verify_payload;

use serde_json::{Map, Value};

use waypoint_types::application::{ActionConfiguration, ActionType};
use waypoint_types::error::ActionError;

use crate::storage::StateStore;

pub use counter::Counter;
pub use echo::Echo;
pub use fail::Fail;
pub use scope::ActionScope;
pub use test_action::TestAction;
pub use verify_payload::VerifyPayload;

/// Resolved input handed to `invoke`.
pub type ActionInput = Map<String, Value>;

/// Output returned by `invoke`, stored as a JSON string.
pub type ActionOutput = Map<String, Value>;

/// The invocation capability shared by every action variant.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Invoke: Send + Sync {
    fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        scope: &ActionScope<'_, S>,
    ) -> impl std::future::Future<Output = Result<Option<ActionOutput>, ActionError>> + Send;
}

/// One instantiated action, dispatched by variant.
#[derive(Debug, Clone)]
pub enum ActionKind {
    TestAction(TestAction),
    Echo(Echo),
    Fail(Fail),
    Counter(Counter),
    VerifyPayload(VerifyPayload),
}

impl ActionKind {
    /// Build the action for `action_type` from its configuration.
    ///
    /// Type-specific settings are checked here, so configuration mistakes
    /// surface when the graph is compiled.
    pub fn instantiate(
        action_type: ActionType,
        config: &ActionConfiguration,
    ) -> Result<Self, ActionError> {
        Ok(match action_type {
            ActionType::TestAction => ActionKind::TestAction(TestAction),
            ActionType::Echo => ActionKind::Echo(Echo::from_config(config)?),
            ActionType::Fail => ActionKind::Fail(Fail::from_config(config)?),
            ActionType::Counter => ActionKind::Counter(Counter::from_config(config)?),
            ActionType::VerifyPayload => {
                ActionKind::VerifyPayload(VerifyPayload::from_config(config)?)
            }
        })
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ActionKind::TestAction(_) => ActionType::TestAction,
            ActionKind::Echo(_) => ActionType::Echo,
            ActionKind::Fail(_) => ActionType::Fail,
            ActionKind::Counter(_) => ActionType::Counter,
            ActionKind::VerifyPayload(_) => ActionType::VerifyPayload,
        }
    }
}

impl Invoke for ActionKind {
    async fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        match self {
            ActionKind::TestAction(a) => a.invoke(input, scope).await,
            ActionKind::Echo(a) => a.invoke(input, scope).await,
            ActionKind::Fail(a) => a.invoke(input, scope).await,
            ActionKind::Counter(a) => a.invoke(input, scope).await,
            ActionKind::VerifyPayload(a) => a.invoke(input, scope).await,
        }
    }
}
