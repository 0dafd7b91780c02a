//! CLI command definitions for the `wpt` binary.
//!
//! Uses clap derive macros for argument parsing. Commands that act on run
//! state take the configuration file plus `--app`/`--user` identifying whose
//! state to touch.

pub mod pointer;
pub mod purge;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use waypoint_types::application::ApplicationGlobals;

/// Run and inspect resumable action graphs.
#[derive(Parser)]
#[command(name = "wpt", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Whose run state a command acts on.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Application id.
    #[arg(long)]
    pub app: String,

    /// User id.
    #[arg(long)]
    pub user: String,
}

impl IdentityArgs {
    pub fn globals(&self) -> ApplicationGlobals {
        ApplicationGlobals::new(&self.app, &self.user)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run (or resume) an application for one user.
    Run {
        /// Application configuration file (.yaml, .yml or .json).
        config: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,

        /// JSON object merged into the run's globals.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Show every action's output and the pointer without running.
    Heap {
        /// Application configuration file.
        config: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Inspect or move the position pointer.
    Pointer {
        #[command(subcommand)]
        action: pointer::PointerCommand,
    },

    /// Compile a configuration file without running it.
    Validate {
        /// Application configuration file.
        config: PathBuf,
    },

    /// Delete expired state records.
    Purge,

    /// Start the REST API server for one application configuration.
    Serve {
        /// Application configuration file.
        config: PathBuf,

        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
