//! `wpt run` and `wpt heap`.

use anyhow::{Result, bail};
use console::style;

use waypoint_core::application::RunError;
use waypoint_types::heap::HeapSnapshot;

use crate::cli::IdentityArgs;
use crate::state::AppState;
use crate::view::{HeapView, parse_payload};

/// Run the application for one identity and print the resulting heap.
pub async fn run(
    state: &AppState,
    identity: &IdentityArgs,
    payload: Option<&str>,
    json: bool,
) -> Result<()> {
    let payload = match payload {
        Some(raw) => parse_payload(raw.as_bytes()).map_err(anyhow::Error::msg)?,
        None => None,
    };

    match state.app.run(identity.globals(), payload).await {
        Ok(snapshot) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&HeapView::from(&snapshot))?);
            } else {
                println!();
                println!(
                    "  {} Run completed for {}/{}",
                    style("✓").green().bold(),
                    style(&identity.app).cyan(),
                    style(&identity.user).cyan(),
                );
                print_heap(&snapshot)?;
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err, json)?;
            bail!("run failed: {err}");
        }
    }
}

/// Print the heap without running anything.
pub async fn heap(state: &AppState, identity: &IdentityArgs, json: bool) -> Result<()> {
    let snapshot = state.app.heap(&identity.globals()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&HeapView::from(&snapshot))?);
    } else {
        println!();
        println!(
            "  Heap for {}/{}",
            style(&identity.app).cyan().bold(),
            style(&identity.user).cyan().bold(),
        );
        print_heap(&snapshot)?;
    }
    Ok(())
}

fn print_heap(snapshot: &HeapSnapshot) -> Result<()> {
    let view = HeapView::from(snapshot);
    println!();
    for (action_id, output) in &view.heap {
        match output {
            Some(value) => println!(
                "  {:<20} {}",
                style(action_id).bold(),
                serde_json::to_string(value)?
            ),
            None => println!(
                "  {:<20} {}",
                style(action_id).bold(),
                style("(no output)").dim()
            ),
        }
    }
    println!();
    println!("  {} {}", style("pointer:").dim(), view.pointer);
    println!();
    Ok(())
}

fn report_failure(err: &RunError, json: bool) -> Result<()> {
    let (action_id, diagnostic) = match err {
        RunError::Action { action_id, source } => (Some(action_id.as_str()), source.diagnostic.as_ref()),
        _ => (None, None),
    };

    if json {
        let body = serde_json::json!({
            "error": {
                "kind": err.kind(),
                "message": err.to_string(),
                "action_id": action_id,
                "diagnostic": diagnostic,
            }
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        eprintln!();
        eprintln!(
            "  {} {} {}",
            style("✗").red().bold(),
            style(err.kind()).red(),
            err
        );
        if let Some(diagnostic) = diagnostic {
            eprintln!("  {}", serde_json::to_string_pretty(diagnostic)?);
        }
        if let Some(action_id) = action_id {
            eprintln!(
                "  {}",
                style(format!("The next run resumes at '{action_id}'.")).dim()
            );
        }
        eprintln!();
    }
    Ok(())
}
