use serde_json::Map;

use waypoint_types::application::ActionConfiguration;
use waypoint_types::error::ActionError;

use super::{ActionInput, ActionOutput, ActionScope, Invoke};
use crate::storage::StateStore;

/// Outputs its configured `constants` overlaid with the resolved input.
#[derive(Debug, Clone, Default)]
pub struct Echo {
    constants: Map<String, serde_json::Value>,
}

impl Echo {
    pub fn from_config(config: &ActionConfiguration) -> Result<Self, ActionError> {
        let constants = match config.setting("constants") {
            None => Map::new(),
            Some(value) => value.as_object().cloned().ok_or_else(|| {
                ActionError::misconfiguration(format!(
                    "[Echo] 'constants' of action '{}' must be an object",
                    config.action_id
                ))
            })?,
        };
        Ok(Self { constants })
    }
}

impl Invoke for Echo {
    async fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        _scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        let mut output = self.constants.clone();
        output.extend(input);
        Ok(Some(output))
    }
}
