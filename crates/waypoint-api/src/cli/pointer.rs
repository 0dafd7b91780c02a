//! Pointer inspection and manual control.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use console::style;

use waypoint_types::heap::PointerState;

use crate::cli::IdentityArgs;
use crate::state::AppState;

/// Pointer subcommands.
#[derive(Subcommand)]
pub enum PointerCommand {
    /// Show where the next run starts.
    Show {
        /// Application configuration file.
        config: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Make the next run resume at an action.
    Set {
        /// Application configuration file.
        config: PathBuf,

        /// Action id to resume at.
        action_id: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Make the next run start at the root.
    Reset {
        /// Application configuration file.
        config: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

impl PointerCommand {
    pub fn config(&self) -> &PathBuf {
        match self {
            PointerCommand::Show { config, .. }
            | PointerCommand::Set { config, .. }
            | PointerCommand::Reset { config, .. } => config,
        }
    }
}

/// Handle a pointer subcommand.
pub async fn handle_pointer_command(cmd: PointerCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        PointerCommand::Show { identity, .. } => {
            let pointer = state.app.pointer(&identity.globals()).await?;
            print_pointer(&identity, &pointer, json)
        }
        PointerCommand::Set {
            identity, action_id, ..
        } => {
            state.app.set_pointer(&identity.globals(), &action_id).await?;
            print_pointer(&identity, &PointerState::At(action_id), json)
        }
        PointerCommand::Reset { identity, .. } => {
            state.app.reset_pointer(&identity.globals()).await?;
            print_pointer(&identity, &PointerState::Completed, json)
        }
    }
}

fn print_pointer(identity: &IdentityArgs, pointer: &PointerState, json: bool) -> Result<()> {
    if json {
        let body = serde_json::json!({
            "app": identity.app,
            "user": identity.user,
            "pointer": pointer,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let next = match pointer.resume_at() {
        Some(id) => format!("resumes at '{}'", style(id).cyan()),
        None => "starts at the root".to_string(),
    };
    println!();
    println!(
        "  {}/{}: pointer {}, next run {}",
        style(&identity.app).bold(),
        style(&identity.user).bold(),
        pointer,
        next
    );
    println!();
    Ok(())
}
