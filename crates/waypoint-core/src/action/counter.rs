use serde_json::json;

use waypoint_types::application::ActionConfiguration;
use waypoint_types::error::ActionError;
use waypoint_types::state::now_millis;

use super::{ActionInput, ActionOutput, ActionScope, Invoke};
use crate::storage::StateStore;

const COUNT_VARIABLE: &str = "count";

/// Persistent per-identity counter.
///
/// On every invocation the `count` variable is initialized to `start` if it
/// holds no number yet, then atomically incremented by `step`. With
/// `expireAfterMs` the counter is reset that long after its last increment.
#[derive(Debug, Clone)]
pub struct Counter {
    start: f64,
    step: f64,
    expire_after_ms: Option<i64>,
}

impl Counter {
    pub fn from_config(config: &ActionConfiguration) -> Result<Self, ActionError> {
        let number = |name: &str, default: f64| -> Result<f64, ActionError> {
            match config.setting(name) {
                None => Ok(default),
                Some(v) => v.as_f64().ok_or_else(|| {
                    ActionError::misconfiguration(format!(
                        "[Counter] '{name}' of action '{}' must be a number",
                        config.action_id
                    ))
                }),
            }
        };
        let expire_after_ms = match config.setting("expireAfterMs") {
            None => None,
            Some(v) => Some(v.as_i64().filter(|ms| *ms > 0).ok_or_else(|| {
                ActionError::misconfiguration(format!(
                    "[Counter] 'expireAfterMs' of action '{}' must be a positive integer",
                    config.action_id
                ))
            })?),
        };
        Ok(Self {
            start: number("start", 0.0)?,
            step: number("step", 1.0)?,
            expire_after_ms,
        })
    }
}

impl Invoke for Counter {
    async fn invoke<S: StateStore>(
        &self,
        _input: ActionInput,
        scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        scope
            .set_numeric_variable_if_not_exist(COUNT_VARIABLE, self.start, None)
            .await?;
        let count = scope.increment_variable(COUNT_VARIABLE, self.step).await?;
        if let Some(ms) = self.expire_after_ms {
            scope.set_expiry(COUNT_VARIABLE, now_millis() + ms).await?;
        }
        tracing::debug!(action_id = scope.action_id(), count, "counter advanced");
        Ok(json!({ "count": count }).as_object().cloned())
    }
}
