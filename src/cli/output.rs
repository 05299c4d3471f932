//! Output formatting utilities for the CLI.
//!
//! Tables are rendered with comfy-table; `--json` prints pretty JSON instead.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{Answer, Entry, RankedContext, StoreStats};

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

/// Format store statistics as a two-column table
pub fn format_stats_table(stats: &StoreStats) -> String {
    let mut table = base_table();
    table.set_header(header(&["Property", "Value"]));
    table.add_row(vec!["Backend".to_string(), stats.backend.clone()]);
    table.add_row(vec!["Dimension".to_string(), stats.dimension.to_string()]);
    table.add_row(vec!["Metric".to_string(), stats.metric.to_string()]);
    table.add_row(vec![
        "Index".to_string(),
        stats
            .index
            .map_or_else(|| "-".to_string(), |kind| kind.to_string()),
    ]);
    table.add_row(vec!["Entries".to_string(), stats.total.to_string()]);
    table.add_row(vec!["Live".to_string(), stats.live.to_string()]);
    table.add_row(vec!["Tombstoned".to_string(), stats.tombstoned.to_string()]);
    table.add_row(vec![
        "Tombstone ratio".to_string(),
        format!("{:.1}%", stats.tombstone_ratio() * 100.0),
    ]);
    table.to_string()
}

/// Format ranked search results
pub fn format_context_table(results: &[RankedContext]) -> String {
    let mut table = base_table();
    table.set_header(header(&["#", "Score", "Source", "ID", "Text"]));
    for (i, ctx) in results.iter().enumerate() {
        let id = ctx.id.to_string();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{:.4}", ctx.score)),
            Cell::new(truncate(&ctx.source, 24)),
            Cell::new(&id[..8]),
            Cell::new(truncate(&ctx.text.replace('\n', " "), 80)),
        ]);
    }
    table.to_string()
}

/// Format a single entry for display
pub fn format_entry(entry: &Entry) -> serde_json::Result<String> {
    let mut out = String::new();
    out.push_str("Entry Details:\n");
    out.push_str("─────────────────────────────────────────\n");
    out.push_str(&format!("ID:          {}\n", entry.id));
    out.push_str(&format!(
        "Created at:  {}\n",
        entry.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Dimension:   {}\n", entry.vector.len()));
    out.push_str("\nMetadata:\n");
    out.push_str(&serde_json::to_string_pretty(&entry.metadata)?);
    Ok(out)
}

/// Format an answer with its numbered sources
pub fn format_answer(answer: &Answer) -> String {
    let mut out = String::new();
    out.push_str(&answer.answer);
    out.push('\n');

    if !answer.sources.is_empty() {
        let mut table = base_table();
        table.set_header(header(&["Ref", "Score", "Source", "ID"]));
        for source in &answer.sources {
            table.add_row(vec![
                format!("[{}]", source.citation),
                format!("{:.4}", source.score),
                source.source.clone(),
                source.id.to_string(),
            ]);
        }
        out.push_str("\nSources:\n");
        out.push_str(&table.to_string());
    }
    out
}
