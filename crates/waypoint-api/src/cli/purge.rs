//! `wpt purge`: delete expired state records.

use anyhow::Result;
use console::style;

use waypoint_infra::ConfiguredStore;
use waypoint_types::state::now_millis;

pub async fn purge(store: &ConfiguredStore, json: bool) -> Result<()> {
    let removed = store.purge_expired(now_millis()).await?;
    tracing::info!(removed, "purged expired state records");

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!();
        println!(
            "  {} Removed {} expired record(s)",
            style("✓").green().bold(),
            removed
        );
        println!();
    }
    Ok(())
}
