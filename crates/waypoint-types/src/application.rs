//! Application configuration tree and run identity types.
//!
//! An application is described by a nested tree of action configurations.
//! Each node names an action `type`, carries that action's `config`, and may
//! point at an `onSuccess` and/or `onFailure` sub-tree:
//!
//! ```yaml
//! type: VerifyPayload
//! config:
//!   actionId: verify
//!   inputSources:
//!     foo: GLOBAL:foo
//!   schema: { type: object, required: [foo] }
//! onSuccess:
//!   type: Echo
//!   config:
//!     actionId: greet
//!     inputSources:
//!       foo: GET:verify:foo
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Configuration tree
// ---------------------------------------------------------------------------

/// One node of the declarative application configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfiguration {
    /// Action type name, matched against the closed action registry.
    #[serde(rename = "type")]
    pub action_type: String,
    /// The action's own configuration.
    pub config: ActionConfiguration,
    /// Sub-tree executed after this action succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<ApplicationConfiguration>>,
    /// Sub-tree executed after this action fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Box<ApplicationConfiguration>>,
}

impl ApplicationConfiguration {
    pub fn new(action_type: impl Into<String>, config: ActionConfiguration) -> Self {
        Self {
            action_type: action_type.into(),
            config,
            on_success: None,
            on_failure: None,
        }
    }

    /// Attach the `onSuccess` sub-tree.
    pub fn on_success(mut self, next: ApplicationConfiguration) -> Self {
        self.on_success = Some(Box::new(next));
        self
    }

    /// Attach the `onFailure` sub-tree.
    pub fn on_failure(mut self, next: ApplicationConfiguration) -> Self {
        self.on_failure = Some(Box::new(next));
        self
    }
}

/// Configuration shared by every action type.
///
/// Type-specific settings (e.g. a `schema` for `VerifyPayload`) are kept in
/// `settings` and interpreted by the action when it is instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfiguration {
    /// Graph-wide unique identifier of this action.
    pub action_id: String,
    /// Attribute name -> source expression (`GLOBAL:`, `GET:` or literal).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_sources: BTreeMap<String, String>,
    /// Remaining type-specific settings.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ActionConfiguration {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            input_sources: BTreeMap::new(),
            settings: Map::new(),
        }
    }

    /// Declare an input attribute and its source expression.
    pub fn with_input(mut self, attribute: impl Into<String>, source: impl Into<String>) -> Self {
        self.input_sources.insert(attribute.into(), source.into());
        self
    }

    /// Add a type-specific setting.
    pub fn with_setting(mut self, name: impl Into<String>, value: Value) -> Self {
        self.settings.insert(name.into(), value);
        self
    }

    /// Look up a type-specific setting.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }
}

// ---------------------------------------------------------------------------
// Action registry keys
// ---------------------------------------------------------------------------

/// The closed set of action implementations an application may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    TestAction,
    Echo,
    Fail,
    Counter,
    VerifyPayload,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::TestAction,
        ActionType::Echo,
        ActionType::Fail,
        ActionType::Counter,
        ActionType::VerifyPayload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::TestAction => "TestAction",
            ActionType::Echo => "Echo",
            ActionType::Fail => "Fail",
            ActionType::Counter => "Counter",
            ActionType::VerifyPayload => "VerifyPayload",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

/// Reference to an entity by id (`{ "id": "..." }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

/// Fixed, run-wide values available to every action via `GLOBAL:` lookups.
///
/// The application and user ids also determine the storage namespace of
/// every stateful read and write made during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationGlobals {
    pub application: EntityRef,
    pub user: EntityRef,
}

impl ApplicationGlobals {
    pub fn new(application_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            application: EntityRef {
                id: application_id.into(),
            },
            user: EntityRef { id: user_id.into() },
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application.id
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}
