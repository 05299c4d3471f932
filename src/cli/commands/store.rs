use anyhow::{Context, Result};
use serde_json::json;
use uuid::Uuid;

use super::open_store;
use crate::cli::output::{format_entry, format_stats_table, print_json};
use crate::domain::models::Config;

/// Handle stats command
pub async fn handle_stats(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.stats().await.context("Failed to read store stats")?;

    if json {
        print_json(&stats)?;
    } else {
        println!("{}", format_stats_table(&stats));
    }
    Ok(())
}

/// Handle rebuild command
pub async fn handle_rebuild(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let before = store.stats().await?;
    store.rebuild().await.context("Failed to rebuild store")?;
    let after = store.stats().await?;

    if json {
        print_json(&json!({
            "removed": before.tombstoned,
            "live": after.live,
        }))?;
    } else {
        println!(
            "Rebuilt store: removed {} tombstoned entr{}, {} live",
            before.tombstoned,
            if before.tombstoned == 1 { "y" } else { "ies" },
            after.live
        );
    }
    Ok(())
}

/// Handle get command
pub async fn handle_get(config: &Config, id: Uuid, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let entry = store
        .get(id)
        .await
        .context("Failed to read entry")?
        .ok_or_else(|| anyhow::anyhow!("Entry not found: {id}"))?;

    if json {
        print_json(&entry)?;
    } else {
        println!("{}", format_entry(&entry)?);
    }
    Ok(())
}

/// Handle delete command
pub async fn handle_delete(config: &Config, id: Uuid, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let deleted = store.delete(id).await.context("Failed to delete entry")?;

    if json {
        print_json(&json!({ "id": id, "deleted": deleted }))?;
    } else if deleted {
        println!("Deleted entry {id}");
    } else {
        println!("No live entry {id}");
    }
    Ok(())
}
