use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::build_pipeline;
use crate::cli::output::print_json;
use crate::domain::models::{Config, Metadata};

/// Handle ingest command
pub async fn handle_ingest(
    config: &Config,
    file: &Path,
    source: Option<String>,
    meta: Vec<(String, String)>,
    json: bool,
) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let source_id = source
        .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| file.display().to_string());

    let metadata: Metadata = meta
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let pipeline = build_pipeline(config).await?;
    let ids = pipeline
        .index_text(&source_id, &text, metadata)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    if json {
        print_json(&json!({ "source": source_id, "chunks": ids.len(), "ids": ids }))?;
    } else {
        println!(
            "Ingested {} as {} chunk{}",
            source_id,
            ids.len(),
            if ids.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
