//! Per-run global context.
//!
//! `RunContext` holds the values `GLOBAL:` input sources read from. It is
//! built fresh for every run and never persisted.

use serde_json::{Map, Value};
use uuid::Uuid;

use waypoint_types::application::ApplicationGlobals;

#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique per run, for correlating log lines.
    pub run_id: Uuid,
    pub identity: ApplicationGlobals,
    globals: Map<String, Value>,
}

impl RunContext {
    /// Merge the caller's payload into the globals.
    ///
    /// `application` and `user` always come from the identity, so a payload
    /// can never redirect reads and writes to another namespace.
    pub fn new(identity: ApplicationGlobals, payload: Option<Map<String, Value>>) -> Self {
        let mut globals = payload.unwrap_or_default();
        globals.insert(
            "application".to_string(),
            serde_json::json!({ "id": identity.application_id() }),
        );
        globals.insert(
            "user".to_string(),
            serde_json::json!({ "id": identity.user_id() }),
        );
        Self {
            run_id: Uuid::now_v7(),
            identity,
            globals,
        }
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_merged() {
        let payload = json!({ "foo": "bar", "n": 3 }).as_object().cloned();
        let ctx = RunContext::new(ApplicationGlobals::new("app", "u1"), payload);

        assert_eq!(ctx.global("foo"), Some(&json!("bar")));
        assert_eq!(ctx.global("n"), Some(&json!(3)));
        assert_eq!(ctx.global("user"), Some(&json!({ "id": "u1" })));
        assert!(ctx.global("missing").is_none());
    }

    #[test]
    fn test_identity_wins_over_payload() {
        let payload = json!({ "user": { "id": "mallory" } }).as_object().cloned();
        let ctx = RunContext::new(ApplicationGlobals::new("app", "u1"), payload);
        assert_eq!(ctx.global("user"), Some(&json!({ "id": "u1" })));
        assert_eq!(ctx.global("application"), Some(&json!({ "id": "app" })));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new(ApplicationGlobals::new("app", "u1"), None);
        let b = RunContext::new(ApplicationGlobals::new("app", "u1"), None);
        assert_ne!(a.run_id, b.run_id);
    }
}
