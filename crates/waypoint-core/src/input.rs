//! Input source grammar and resolution.
//!
//! Each attribute of an action's `inputSources` maps to one expression:
//!
//! - `GLOBAL:<name>` reads `<name>` from the run's global context;
//! - `GET:<actionId>:<fieldName>` reads `<fieldName>` from the persisted
//!   output of `<actionId>`;
//! - anything else is taken verbatim as a string literal.
//!
//! Expressions are colon-delimited with no escaping.

use std::collections::BTreeMap;

use futures_util::future::try_join_all;
use serde_json::Value;
use thiserror::Error;

use waypoint_types::error::{ActionError, RepositoryError};

use crate::action::{ActionInput, ActionScope};
use crate::context::RunContext;
use crate::gateway::StateGateway;
use crate::graph::ActionGraph;
use crate::storage::StateStore;

const GLOBAL_PREFIX: &str = "GLOBAL:";
const GET_PREFIX: &str = "GET:";

/// A parsed input source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceExpr<'a> {
    Global(&'a str),
    Get { action_id: &'a str, field: &'a str },
    Literal(&'a str),
}

impl<'a> SourceExpr<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, InputError> {
        if raw.starts_with(GLOBAL_PREFIX) {
            let parts: Vec<&str> = raw.split(':').collect();
            return match parts.as_slice() {
                [_, name] if !name.is_empty() => Ok(SourceExpr::Global(name)),
                _ => Err(InputError::Malformed(raw.to_string())),
            };
        }
        if raw.starts_with(GET_PREFIX) {
            let parts: Vec<&str> = raw.split(':').collect();
            return match parts.as_slice() {
                [_, action_id, field] if !action_id.is_empty() && !field.is_empty() => {
                    Ok(SourceExpr::Get { action_id, field })
                }
                _ => Err(InputError::Malformed(raw.to_string())),
            };
        }
        Ok(SourceExpr::Literal(raw))
    }
}

/// Failure while resolving an action's input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed input source expression '{0}'")]
    Malformed(String),

    #[error("input source references unknown action '{0}'")]
    UnknownAction(String),

    #[error("Previous action var lookup failure. {action_id}:{field}")]
    MissingOutput { action_id: String, field: String },

    #[error("storage error while resolving input: {0}")]
    Storage(#[from] RepositoryError),
}

impl From<InputError> for ActionError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Storage(e) => e.into(),
            other => ActionError::misconfiguration(other.to_string()),
        }
    }
}

/// Resolve every declared input attribute concurrently.
///
/// A missing global, or a field absent from an existing output, leaves the
/// attribute out of the result. A `GET:` whose target has no output fails
/// the whole resolution.
pub async fn resolve_input<S: StateStore>(
    sources: &BTreeMap<String, String>,
    ctx: &RunContext,
    graph: &ActionGraph,
    gateway: &StateGateway<S>,
) -> Result<ActionInput, InputError> {
    let lookups = sources.iter().map(|(attribute, raw)| async move {
        let value = match SourceExpr::parse(raw)? {
            SourceExpr::Global(name) => ctx.global(name).cloned(),
            SourceExpr::Literal(text) => Some(Value::String(text.to_string())),
            SourceExpr::Get { action_id, field } => {
                let node = graph
                    .node(action_id)
                    .ok_or_else(|| InputError::UnknownAction(action_id.to_string()))?;
                let output = ActionScope::new(node.id(), gateway)
                    .get_output()
                    .await?
                    .ok_or_else(|| InputError::MissingOutput {
                        action_id: action_id.to_string(),
                        field: field.to_string(),
                    })?;
                output.get(field).cloned()
            }
        };
        Ok::<_, InputError>(value.map(|v| (attribute.clone(), v)))
    });

    let resolved = try_join_all(lookups).await?;
    Ok(resolved.into_iter().flatten().collect())
}
