use serde_json::json;

use waypoint_types::application::ActionConfiguration;
use waypoint_types::error::{ActionError, FailureKind};

use super::{ActionInput, ActionOutput, ActionScope, Invoke};
use crate::storage::StateStore;

/// Always fails with its configured kind and message.
#[derive(Debug, Clone)]
pub struct Fail {
    kind: FailureKind,
    message: String,
}

impl Fail {
    pub fn from_config(config: &ActionConfiguration) -> Result<Self, ActionError> {
        let kind = match config.setting("kind") {
            None => FailureKind::BadRequest,
            Some(value) => value
                .as_str()
                .ok_or_else(|| "must be a string".to_string())
                .and_then(str::parse::<FailureKind>)
                .map_err(|e| {
                    ActionError::misconfiguration(format!(
                        "[Fail] invalid 'kind' for action '{}': {e}",
                        config.action_id
                    ))
                })?,
        };
        let message = config
            .setting("message")
            .and_then(|v| v.as_str())
            .unwrap_or("action failed")
            .to_string();
        Ok(Self { kind, message })
    }
}

impl Invoke for Fail {
    async fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        _scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        Err(ActionError::new(self.kind, self.message.clone())
            .with_diagnostic(json!({ "input": input })))
    }
}
