//! Command handlers
//!
//! Every handler receives the loaded configuration, opens what it needs
//! through the adapter factory and prints either tables or JSON.

pub mod ingest;
pub mod query;
pub mod store;

use std::sync::Arc;

use anyhow::{Context, Result};

use super::types::{Commands, FilterArgs};
use crate::adapters::factory;
use crate::domain::models::{Config, Relation, SearchFilter};
use crate::domain::ports::VectorStore;
use crate::infrastructure::vector::Chunker;
use crate::services::RagPipeline;

/// Dispatch a parsed command
pub async fn execute(command: Commands, config: &Config, json: bool) -> Result<()> {
    match command {
        Commands::Stats => store::handle_stats(config, json).await,
        Commands::Rebuild => store::handle_rebuild(config, json).await,
        Commands::Get { id } => store::handle_get(config, id, json).await,
        Commands::Delete { id } => store::handle_delete(config, id, json).await,
        Commands::Ingest { file, source, meta } => {
            ingest::handle_ingest(config, &file, source, meta, json).await
        }
        Commands::Search {
            query,
            top_k,
            filter,
        } => query::handle_search(config, &query, top_k, &filter, json).await,
        Commands::Ask {
            question,
            top_k,
            timeout_secs,
            filter,
        } => query::handle_ask(config, &question, top_k, timeout_secs, &filter, json).await,
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    factory::open_store(&config.store)
        .await
        .with_context(|| format!("Failed to open vector store at {}", config.store.path))
}

async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    let store = open_store(config).await?;
    let embedder = factory::embedding_provider(&config.embedding)
        .context("Failed to build embedding provider")?;
    let generator = factory::generation_provider(&config.generation)
        .context("Failed to build generation provider")?;
    let chunker = Chunker::with_config(config.chunking.clone())?;

    RagPipeline::new(embedder, store, generator, chunker, config.retrieval)
        .context("Failed to assemble retrieval pipeline")
}

fn build_filter(args: &FilterArgs) -> Option<SearchFilter> {
    let mut filter = SearchFilter::new();
    if let Some(symbol) = &args.symbol {
        filter = filter.related_to(Relation::About, symbol.clone());
    }
    if let Some(market) = &args.market {
        filter = if filter.related_to.is_none() {
            filter.related_to(Relation::BelongsTo, market.clone())
        } else {
            filter.with_metadata(Relation::BelongsTo.metadata_key(), market.clone())
        };
    }
    (!filter.is_empty()).then_some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter(&FilterArgs::default()).is_none());

        let filter = build_filter(&FilterArgs {
            symbol: Some("AAPL".to_string()),
            market: Some("NASDAQ".to_string()),
        })
        .unwrap();
        let related = filter.related_to.as_ref().unwrap();
        assert_eq!(related.relation, Relation::About);
        assert_eq!(related.target, "AAPL");
        assert_eq!(filter.metadata_equals["market"], "NASDAQ");

        let filter = build_filter(&FilterArgs {
            symbol: None,
            market: Some("KRX".to_string()),
        })
        .unwrap();
        assert_eq!(filter.related_to.unwrap().relation, Relation::BelongsTo);
    }
}
