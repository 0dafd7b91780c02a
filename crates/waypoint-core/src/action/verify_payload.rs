use serde_json::{Value, json};

use waypoint_types::application::ActionConfiguration;
use waypoint_types::error::ActionError;

use super::schema::Schema;
use super::{ActionInput, ActionOutput, ActionScope, Invoke};
use crate::storage::StateStore;

/// Validates the resolved input against the configured `schema`.
///
/// The schema is compiled when the graph is built, so a bad schema fails the
/// whole configuration instead of the first run that reaches this action.
#[derive(Debug, Clone)]
pub struct VerifyPayload {
    schema: Schema,
}

impl VerifyPayload {
    pub fn from_config(config: &ActionConfiguration) -> Result<Self, ActionError> {
        let doc = config.setting("schema").ok_or_else(|| {
            ActionError::misconfiguration(format!(
                "[VerifyPayload] action '{}' has no 'schema'",
                config.action_id
            ))
        })?;
        let schema = Schema::compile(doc).map_err(|e| {
            ActionError::misconfiguration(format!("[VerifyPayload] {e}"))
                .with_diagnostic(json!({ "schema": doc }))
        })?;
        Ok(Self { schema })
    }
}

impl Invoke for VerifyPayload {
    async fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        _scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        let document = Value::Object(input);
        let errors = self.schema.validate(&document);
        if !errors.is_empty() {
            return Err(ActionError::bad_request(format!(
                "JSON input does not match schema: {}",
                errors.join("; ")
            ))
            .with_diagnostic(json!({ "errors": errors })));
        }
        match document {
            Value::Object(validated) => Ok(Some(validated)),
            _ => Ok(None),
        }
    }
}
