//! Backend selection.
//!
//! `ConfiguredStore` is the `StateStore` the binaries run against. It wraps
//! whichever backend `EngineConfig.storage.backend` names and dispatches
//! each call to it.

use std::path::Path;

use waypoint_core::storage::{MemoryStateStore, StateStore};
use waypoint_types::config::{EngineConfig, StorageBackend};
use waypoint_types::error::RepositoryError;
use waypoint_types::state::StateRecord;

use crate::sqlite::pool::{DatabasePool, default_database_url};
use crate::sqlite::state::SqliteStateStore;

#[derive(Clone)]
pub enum ConfiguredStore {
    Sqlite(SqliteStateStore),
    Memory(MemoryStateStore),
}

impl ConfiguredStore {
    /// Open the backend selected by `config`, rooted at `data_dir`.
    pub async fn open(config: &EngineConfig, data_dir: &Path) -> Result<Self, sqlx::Error> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::info!("using in-memory state store; state is lost on exit");
                Ok(ConfiguredStore::Memory(MemoryStateStore::new()))
            }
            StorageBackend::Sqlite => {
                let url = config
                    .storage
                    .database_url
                    .clone()
                    .unwrap_or_else(|| default_database_url(data_dir));
                let pool = DatabasePool::new(&url).await?;
                Ok(ConfiguredStore::Sqlite(SqliteStateStore::new(pool)))
            }
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            ConfiguredStore::Sqlite(_) => StorageBackend::Sqlite,
            ConfiguredStore::Memory(_) => StorageBackend::Memory,
        }
    }

    /// Remove expired records. Returns how many were removed.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<u64, RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.purge_expired(now_ms).await,
            ConfiguredStore::Memory(s) => Ok(s.purge_expired(now_ms)),
        }
    }
}

impl StateStore for ConfiguredStore {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.get(key).await,
            ConfiguredStore::Memory(s) => s.get(key).await,
        }
    }

    async fn put_string(
        &self,
        key: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.put_string(key, value, expire_at).await,
            ConfiguredStore::Memory(s) => s.put_string(key, value, expire_at).await,
        }
    }

    async fn put_number(
        &self,
        key: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite: bool,
    ) -> Result<bool, RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.put_number(key, value, expire_at, overwrite).await,
            ConfiguredStore::Memory(s) => s.put_number(key, value, expire_at, overwrite).await,
        }
    }

    async fn increment(&self, key: &str, by: f64) -> Result<f64, RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.increment(key, by).await,
            ConfiguredStore::Memory(s) => s.increment(key, by).await,
        }
    }

    async fn set_expiry(&self, key: &str, expire_at: i64) -> Result<(), RepositoryError> {
        match self {
            ConfiguredStore::Sqlite(s) => s.set_expiry(key, expire_at).await,
            ConfiguredStore::Memory(s) => s.set_expiry(key, expire_at).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use waypoint_core::Application;
    use waypoint_types::application::{
        ActionConfiguration, ApplicationConfiguration, ApplicationGlobals,
    };
    use waypoint_types::config::StorageConfig;

    fn config(backend: StorageBackend) -> EngineConfig {
        EngineConfig {
            storage: StorageConfig {
                backend,
                database_url: None,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfiguredStore::open(&config(StorageBackend::Memory), dir.path())
            .await
            .unwrap();
        assert_eq!(store.backend(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_open_sqlite_backend_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfiguredStore::open(&config(StorageBackend::Sqlite), dir.path())
            .await
            .unwrap();
        assert_eq!(store.backend(), StorageBackend::Sqlite);
        assert!(dir.path().join("waypoint.db").exists());
    }

    #[tokio::test]
    async fn test_run_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let conf = ApplicationConfiguration::new(
            "Echo",
            ActionConfiguration::new("a1").with_setting("constants", json!({ "text": "Hola" })),
        )
        .on_success(ApplicationConfiguration::new(
            "Fail",
            ActionConfiguration::new("boom"),
        ));
        let identity = ApplicationGlobals::new("app", "u1");

        {
            let store = ConfiguredStore::open(&config(StorageBackend::Sqlite), dir.path())
                .await
                .unwrap();
            let app = Application::from_config(&conf, Arc::new(store)).unwrap();
            assert!(app.run(identity.clone(), None).await.is_err());
        }

        let store = ConfiguredStore::open(&config(StorageBackend::Sqlite), dir.path())
            .await
            .unwrap();
        let app = Application::from_config(&conf, Arc::new(store)).unwrap();
        let heap = app.heap(&identity).await.unwrap();
        assert_eq!(heap.pointer.as_deref(), Some("boom"));
        assert_eq!(heap.output("a1").unwrap()["text"], json!("Hola"));
    }
}
