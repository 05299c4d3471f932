use anyhow::{Context, Result};

use super::{build_filter, build_pipeline};
use crate::cli::output::{format_answer, format_context_table, print_json};
use crate::cli::types::FilterArgs;
use crate::domain::models::Config;
use crate::services::deadline_after;

/// Handle search command
pub async fn handle_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    filter: &FilterArgs,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let filter = build_filter(filter);
    let deadline = deadline_after(config.retrieval.timeout_secs);

    let results = pipeline
        .retrieve_with(query, top_k, filter.as_ref(), deadline)
        .await
        .context("Search failed")?;

    if json {
        print_json(&results)?;
    } else if results.is_empty() {
        println!("No matching entries.");
    } else {
        println!("{}", format_context_table(&results));
    }
    Ok(())
}

/// Handle ask command
pub async fn handle_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    timeout_secs: Option<u64>,
    filter: &FilterArgs,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let filter = build_filter(filter);
    let timeout = timeout_secs.unwrap_or(config.retrieval.timeout_secs);
    let deadline = deadline_after(timeout);

    let answer = pipeline
        .answer_with(question, top_k, filter.as_ref(), deadline)
        .await
        .context("Failed to answer question")?;

    if json {
        print_json(&answer)?;
    } else {
        println!("{}", format_answer(&answer));
    }
    Ok(())
}
