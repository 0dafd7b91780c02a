//! Application state wiring the compiled graph to the configured store.
//!
//! AppState holds the concrete `Application` used by both CLI commands and
//! REST handlers. `Application` is generic over `StateStore`; AppState pins
//! it to `ConfiguredStore`, the backend named in `config.toml`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use waypoint_core::Application;
use waypoint_core::definition::load_graph;
use waypoint_infra::ConfiguredStore;
use waypoint_types::config::EngineConfig;

/// The application type pinned to the infra store.
pub type ConcreteApplication = Application<ConfiguredStore>;

/// Shared state for CLI commands and REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: ConcreteApplication,
}

impl AppState {
    /// Compile the configuration file and open the configured store.
    pub async fn init(
        config_path: &Path,
        engine: &EngineConfig,
        data_dir: &Path,
    ) -> anyhow::Result<Self> {
        let graph = load_graph(config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        let store = open_store(engine, data_dir).await?;
        tracing::debug!(
            root = graph.root_id(),
            nodes = graph.len(),
            backend = ?store.backend(),
            "application state initialized"
        );
        Ok(Self {
            app: Application::new(Arc::new(graph), Arc::new(store)),
        })
    }
}

/// Open the backend selected by `engine`, creating `data_dir` if needed.
pub async fn open_store(engine: &EngineConfig, data_dir: &Path) -> anyhow::Result<ConfiguredStore> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    ConfiguredStore::open(engine, data_dir)
        .await
        .context("failed to open state store")
}
