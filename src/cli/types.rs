//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::domain::models::MAX_TIMEOUT_SECS;

#[derive(Parser)]
#[command(name = "stockrag")]
#[command(about = "Stockrag - semantic retrieval over market notes", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .stockrag/config.yaml + .stockrag/local.yaml)
    #[arg(short, long, global = true, env = "STOCKRAG_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show store statistics
    Stats,

    /// Compact the store, dropping tombstoned entries
    Rebuild,

    /// Show a single entry
    Get {
        /// Entry ID
        id: Uuid,
    },

    /// Tombstone an entry
    Delete {
        /// Entry ID
        id: Uuid,
    },

    /// Chunk, embed and store a text file
    Ingest {
        /// Path to a UTF-8 text file
        file: PathBuf,

        /// Source identifier recorded on every chunk (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,

        /// Extra metadata as key=value (repeatable), e.g. --meta symbol=AAPL
        #[arg(short, long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Retrieve ranked context for a query
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Answer a question from retrieved context
    Ask {
        /// Question text
        question: String,

        /// Number of context entries to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Deadline for the whole request in seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
        timeout_secs: Option<u64>,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Search restrictions shared by `search` and `ask`
#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Only entries about this ticker symbol
    #[arg(long)]
    pub symbol: Option<String>,

    /// Only entries belonging to this market
    #[arg(long)]
    pub market: Option<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("symbol=AAPL").unwrap(),
            ("symbol".to_string(), "AAPL".to_string())
        );
        assert_eq!(
            parse_key_val("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("symbol").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "stockrag", "--json", "search", "rate cut", "-k", "3", "--symbol", "AAPL",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Search {
                query,
                top_k,
                filter,
            } => {
                assert_eq!(query, "rate cut");
                assert_eq!(top_k, Some(3));
                assert_eq!(filter.symbol.as_deref(), Some("AAPL"));
                assert!(filter.market.is_none());
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_parse_ingest_meta() {
        let cli = Cli::try_parse_from([
            "stockrag",
            "ingest",
            "notes.txt",
            "--meta",
            "symbol=005930",
            "--meta",
            "market=KRX",
        ])
        .unwrap();
        match cli.command {
            Commands::Ingest { file, source, meta } => {
                assert_eq!(file, PathBuf::from("notes.txt"));
                assert!(source.is_none());
                assert_eq!(meta.len(), 2);
            }
            _ => panic!("expected ingest command"),
        }
    }

    #[test]
    fn test_ask_timeout_is_bounded() {
        let cli = Cli::try_parse_from(["stockrag", "ask", "why?", "--timeout-secs", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ask {
                timeout_secs: Some(5),
                ..
            }
        ));

        for bad in ["0", "18446744073709551615"] {
            assert!(Cli::try_parse_from(["stockrag", "ask", "why?", "--timeout-secs", bad]).is_err());
        }
    }
}
