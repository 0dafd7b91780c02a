//! Persistence gateway.
//!
//! `StateGateway` wraps a `StateStore` and binds it to one
//! (application, user) identity. Callers address logical keys such as an
//! action id plus a variable name; the gateway computes the namespaced
//! store key:
//!
//! - action variable: `{appId}:{userId}:actionState:{actionId}:{variableName}`
//! - position pointer: `{appId}:{userId}:linkedListId`
//!
//! Every store call is timed and logged at `debug` with an `elapsed_ms` field.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::Instant;

use waypoint_types::application::ApplicationGlobals;
use waypoint_types::error::RepositoryError;
use waypoint_types::heap::HeapSnapshot;

use crate::graph::ActionGraph;
use crate::storage::StateStore;

/// Reserved variable under which an action's output is stored.
pub const OUTPUT_VARIABLE: &str = "output";

/// Namespaced access to a `StateStore` for one (application, user) pair.
pub struct StateGateway<S: StateStore> {
    store: Arc<S>,
    application_id: String,
    user_id: String,
}

impl<S: StateStore> StateGateway<S> {
    pub fn new(store: Arc<S>, globals: &ApplicationGlobals) -> Self {
        Self {
            store,
            application_id: globals.application_id().to_string(),
            user_id: globals.user_id().to_string(),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Store key of one action variable.
    pub fn action_key(&self, action_id: &str, variable: &str) -> String {
        format!(
            "{}:{}:actionState:{}:{}",
            self.application_id, self.user_id, action_id, variable
        )
    }

    /// Store key of the position pointer.
    pub fn pointer_key(&self) -> String {
        format!("{}:{}:linkedListId", self.application_id, self.user_id)
    }

    // -----------------------------------------------------------------------
    // Key-level operations
    // -----------------------------------------------------------------------

    /// `None` when absent; `Some("")` when the record holds no string.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let record = timed("get_string", key, self.store.get(key)).await?;
        Ok(record.map(|r| r.string_value.unwrap_or_default()))
    }

    pub async fn set_string(
        &self,
        key: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        timed("set_string", key, self.store.put_string(key, value, expire_at)).await
    }

    /// `None` when absent or when the record holds no number.
    pub async fn get_number(&self, key: &str) -> Result<Option<f64>, RepositoryError> {
        let record = timed("get_number", key, self.store.get(key)).await?;
        Ok(record.and_then(|r| r.numeric_value))
    }

    /// Returns whether a write happened (always true when overwriting).
    pub async fn set_number(
        &self,
        key: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite_if_exists: bool,
    ) -> Result<bool, RepositoryError> {
        timed(
            "set_number",
            key,
            self.store
                .put_number(key, value, expire_at, overwrite_if_exists),
        )
        .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        let record = timed("exists", key, self.store.get(key)).await?;
        Ok(record.is_some())
    }

    pub async fn increment(&self, key: &str, by: f64) -> Result<f64, RepositoryError> {
        timed("increment", key, self.store.increment(key, by)).await
    }

    pub async fn set_expiry(&self, key: &str, at_unix_ms: i64) -> Result<(), RepositoryError> {
        timed("set_expiry", key, self.store.set_expiry(key, at_unix_ms)).await
    }

    // -----------------------------------------------------------------------
    // Action variables
    // -----------------------------------------------------------------------

    pub async fn get_string_variable(
        &self,
        action_id: &str,
        variable: &str,
    ) -> Result<Option<String>, RepositoryError> {
        self.get_string(&self.action_key(action_id, variable)).await
    }

    pub async fn set_string_variable(
        &self,
        action_id: &str,
        variable: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        self.set_string(&self.action_key(action_id, variable), value, expire_at)
            .await
    }

    pub async fn get_numeric_variable(
        &self,
        action_id: &str,
        variable: &str,
    ) -> Result<Option<f64>, RepositoryError> {
        self.get_number(&self.action_key(action_id, variable)).await
    }

    pub async fn set_numeric_variable(
        &self,
        action_id: &str,
        variable: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite_if_exists: bool,
    ) -> Result<bool, RepositoryError> {
        self.set_number(
            &self.action_key(action_id, variable),
            value,
            expire_at,
            overwrite_if_exists,
        )
        .await
    }

    pub async fn variable_exists(
        &self,
        action_id: &str,
        variable: &str,
    ) -> Result<bool, RepositoryError> {
        self.exists(&self.action_key(action_id, variable)).await
    }

    pub async fn increment_variable(
        &self,
        action_id: &str,
        variable: &str,
        by: f64,
    ) -> Result<f64, RepositoryError> {
        self.increment(&self.action_key(action_id, variable), by)
            .await
    }

    pub async fn set_variable_expiry(
        &self,
        action_id: &str,
        variable: &str,
        at_unix_ms: i64,
    ) -> Result<(), RepositoryError> {
        self.set_expiry(&self.action_key(action_id, variable), at_unix_ms)
            .await
    }

    // -----------------------------------------------------------------------
    // Position pointer
    // -----------------------------------------------------------------------

    /// `None` = never started, `Some("")` = completed, else the node to resume at.
    pub async fn get_pointer(&self) -> Result<Option<String>, RepositoryError> {
        self.get_string(&self.pointer_key()).await
    }

    pub async fn set_pointer(&self, action_id: &str) -> Result<(), RepositoryError> {
        tracing::debug!(
            application_id = %self.application_id,
            user_id = %self.user_id,
            pointer = action_id,
            "moving pointer"
        );
        self.set_string(&self.pointer_key(), action_id, None).await
    }

    // -----------------------------------------------------------------------
    // Heap
    // -----------------------------------------------------------------------

    /// Read every node's output concurrently, plus the pointer.
    ///
    /// A failed output read degrades to `None` for that node.
    pub async fn get_heap(&self, graph: &ActionGraph) -> Result<HeapSnapshot, RepositoryError> {
        let reads = graph.node_ids().map(|id| async move {
            let output = match self.get_string_variable(id, OUTPUT_VARIABLE).await {
                Ok(Some(raw)) if !raw.is_empty() => Some(raw),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(action_id = id, error = %e, "heap read failed, reporting null");
                    None
                }
            };
            (id.to_string(), output)
        });

        let heap = join_all(reads).await.into_iter().collect();
        let pointer = self.get_pointer().await?;
        Ok(HeapSnapshot { heap, pointer })
    }
}

/// Await a store call and log its duration.
async fn timed<T, F>(op: &'static str, key: &str, call: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let result = call.await;
    tracing::debug!(
        op,
        key,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "state store call"
    );
    result
}
