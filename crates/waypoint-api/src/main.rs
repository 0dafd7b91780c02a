//! Waypoint CLI and REST API entry point.
//!
//! Binary name: `wpt`
//!
//! Parses CLI arguments, loads the engine configuration, opens the state
//! store and compiles the application, then dispatches to the command
//! handler or starts the REST API server.

mod cli;
mod http;
mod state;
mod view;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use waypoint_infra::config::{load_engine_config, resolve_data_dir};
use waypoint_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use waypoint_types::config::EngineConfig;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions and validation don't need the store or tracing
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "wpt", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Validate { config } => return cli::validate::validate(config, cli.json),
        _ => {}
    }

    let data_dir = resolve_data_dir();
    let engine = load_engine_config(&data_dir).await;

    init_tracing(&TracingOptions {
        otel: engine.telemetry.otel,
        json: false,
        default_filter: filter_for(cli.verbose, cli.quiet).to_string(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    tracing::debug!(data_dir = %data_dir.display(), backend = ?engine.storage.backend, "engine configuration loaded");

    let result = dispatch(cli, &engine, &data_dir).await;
    shutdown_tracing();
    result
}

/// Log filter for the `-v`/`--quiet` flags. `RUST_LOG` still wins.
fn filter_for(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,waypoint_core=debug,waypoint_infra=debug",
        _ => "trace",
    }
}

async fn dispatch(cli: Cli, engine: &EngineConfig, data_dir: &Path) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            config,
            identity,
            payload,
        } => {
            let state = AppState::init(&config, engine, data_dir).await?;
            cli::run::run(&state, &identity, payload.as_deref(), cli.json).await?;
        }

        Commands::Heap { config, identity } => {
            let state = AppState::init(&config, engine, data_dir).await?;
            cli::run::heap(&state, &identity, cli.json).await?;
        }

        Commands::Pointer { action } => {
            let state = AppState::init(action.config(), engine, data_dir).await?;
            cli::pointer::handle_pointer_command(action, &state, cli.json).await?;
        }

        Commands::Purge => {
            let store = state::open_store(engine, data_dir).await?;
            cli::purge::purge(&store, cli.json).await?;
        }

        Commands::Serve { config, port, host } => {
            let state = AppState::init(&config, engine, data_dir).await?;

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} Waypoint API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}/api/v1")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } | Commands::Validate { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_flags() {
        assert_eq!(filter_for(0, true), "error");
        assert_eq!(filter_for(0, false), "warn");
        assert!(filter_for(1, false).contains("waypoint_core=debug"));
        assert_eq!(filter_for(3, false), "trace");
    }
}
