use serde_json::{Value, json};

use waypoint_types::error::ActionError;

use super::{ActionInput, ActionOutput, ActionScope, Invoke};
use crate::storage::StateStore;

/// Fixed-output action used to exercise wiring: echoes its input back under
/// `inputGivenToAction` alongside a few constant fields.
#[derive(Debug, Clone, Default)]
pub struct TestAction;

impl Invoke for TestAction {
    async fn invoke<S: StateStore>(
        &self,
        input: ActionInput,
        _scope: &ActionScope<'_, S>,
    ) -> Result<Option<ActionOutput>, ActionError> {
        let output = json!({
            "testOutput": "Hi there! This is test output.",
            "someText": "Hola",
            "flimFlam": true,
            "inputGivenToAction": Value::Object(input),
        });
        Ok(output.as_object().cloned())
    }
}
