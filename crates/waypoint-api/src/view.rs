//! Presentation helpers shared by the CLI and the REST API.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use waypoint_types::heap::{HeapSnapshot, PointerState};

/// A heap snapshot with each output decoded from its stored JSON text.
#[derive(Debug, Serialize)]
pub struct HeapView {
    /// Action id -> output object, `null` when the action never produced one.
    pub heap: BTreeMap<String, Option<Value>>,
    pub pointer: PointerState,
}

impl From<&HeapSnapshot> for HeapView {
    fn from(snapshot: &HeapSnapshot) -> Self {
        let heap = snapshot
            .heap
            .iter()
            .map(|(id, raw)| {
                // Output that is not valid JSON is shown verbatim.
                let value = raw.as_deref().map(|raw| {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
                });
                (id.clone(), value)
            })
            .collect();
        Self {
            heap,
            pointer: snapshot.pointer_state(),
        }
    }
}

/// Parse a run payload. Blank input means "no payload"; anything else must
/// be a JSON object.
pub fn parse_payload(raw: &[u8]) -> Result<Option<Map<String, Value>>, String> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(format!(
            "payload must be a JSON object, got {}",
            json_type_name(&other)
        )),
        Err(e) => Err(format!("payload is not valid JSON: {e}")),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
