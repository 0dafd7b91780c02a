//! Per-action view of the persistence gateway.
//!
//! An `ActionScope` is bound to one action id. Every variable it reads or
//! writes lives under that action's namespace, so an action can never touch
//! another action's state. Reading another action's output is done by the
//! input resolver, never by the action itself.

use serde_json::{Map, Value};

use waypoint_types::error::RepositoryError;

use crate::gateway::{OUTPUT_VARIABLE, StateGateway};
use crate::storage::StateStore;

use super::ActionOutput;

pub struct ActionScope<'a, S: StateStore> {
    action_id: &'a str,
    gateway: &'a StateGateway<S>,
}

impl<'a, S: StateStore> ActionScope<'a, S> {
    pub fn new(action_id: &'a str, gateway: &'a StateGateway<S>) -> Self {
        Self { action_id, gateway }
    }

    pub fn action_id(&self) -> &str {
        self.action_id
    }

    pub async fn get_string_variable(&self, name: &str) -> Result<Option<String>, RepositoryError> {
        self.gateway.get_string_variable(self.action_id, name).await
    }

    pub async fn get_numeric_variable(&self, name: &str) -> Result<Option<f64>, RepositoryError> {
        self.gateway.get_numeric_variable(self.action_id, name).await
    }

    pub async fn set_string_variable(
        &self,
        name: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        self.gateway
            .set_string_variable(self.action_id, name, value, expire_at)
            .await
    }

    /// Write a number, replacing any existing value.
    pub async fn set_numeric_variable(
        &self,
        name: &str,
        value: f64,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        self.gateway
            .set_numeric_variable(self.action_id, name, value, expire_at, true)
            .await
            .map(|_| ())
    }

    /// Write a number only if the variable holds none yet. Returns whether it wrote.
    pub async fn set_numeric_variable_if_not_exist(
        &self,
        name: &str,
        value: f64,
        expire_at: Option<i64>,
    ) -> Result<bool, RepositoryError> {
        self.gateway
            .set_numeric_variable(self.action_id, name, value, expire_at, false)
            .await
    }

    pub async fn variable_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        self.gateway.variable_exists(self.action_id, name).await
    }

    pub async fn increment_variable(&self, name: &str, by: f64) -> Result<f64, RepositoryError> {
        self.gateway
            .increment_variable(self.action_id, name, by)
            .await
    }

    pub async fn set_expiry(&self, name: &str, at_unix_ms: i64) -> Result<(), RepositoryError> {
        self.gateway
            .set_variable_expiry(self.action_id, name, at_unix_ms)
            .await
    }

    /// The action's persisted output, `None` if it never produced one.
    pub async fn get_output(&self) -> Result<Option<ActionOutput>, RepositoryError> {
        let raw = self.get_string_variable(OUTPUT_VARIABLE).await?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => serde_json::from_str::<Map<String, Value>>(raw)
                .map(Some)
                .map_err(|e| {
                    RepositoryError::Query(format!(
                        "corrupt output for action '{}': {e}",
                        self.action_id
                    ))
                }),
        }
    }

    /// Persist the action's output. Only the orchestrator calls this.
    pub(crate) async fn set_output(&self, output: &ActionOutput) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(output)
            .map_err(|e| RepositoryError::Query(format!("output serialization failed: {e}")))?;
        self.set_string_variable(OUTPUT_VARIABLE, &raw, None).await
    }
}
