//! RAG (Retrieval-Augmented Generation) pipeline
//!
//! High-level orchestration for indexing and answering: chunking and
//! embedding documents into the vector store, turning a question into ranked,
//! citable context, and delegating the final answer to a generator.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::retrieval::{SOURCE_ID_KEY, SOURCE_KEY, TEXT_KEY};
use crate::domain::models::{
    Answer, Metadata, RankedContext, RetrievalConfig, SearchFilter, SourceRef,
};
use crate::domain::ports::{EmbeddingProvider, GenerationProvider, VectorStore};
use crate::infrastructure::vector::Chunker;

/// Deadline `secs` from now; `None` when it is beyond what the clock can
/// represent, which means no deadline.
pub fn deadline_after(secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs))
}

/// Prefix of the answer returned when generation fails.
pub const DEGRADED_ANSWER_PREFIX: &str = "context available, generation failed";

/// Retrieval pipeline over an embedding provider, a vector store and a
/// generator.
///
/// This service provides high-level operations for:
/// - Indexing documents with automatic chunking and embedding
/// - Retrieving ranked context for queries
/// - Building augmented prompts and answering with citations
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    chunker: Chunker,
    config: RetrievalConfig,
}

impl RagPipeline {
    /// Create a new pipeline
    ///
    /// # Arguments
    /// * `embedder` - Embeds documents and queries
    /// * `store` - Vector store holding the embedded chunks
    /// * `generator` - Produces the final answer
    /// * `chunker` - Splits documents before embedding
    /// * `config` - Retrieval defaults and context budget
    ///
    /// # Errors
    /// `Config` when the embedder and the store disagree on dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationProvider>,
        chunker: Chunker,
        config: RetrievalConfig,
    ) -> RagResult<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(RagError::Config(format!(
                "embedding provider {} produces {} dimensions but the store expects {}",
                embedder.name(),
                embedder.dimension(),
                store.dimension()
            )));
        }
        if config.context_char_budget == 0 {
            return Err(RagError::Config(
                "retrieval.context_char_budget must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            store,
            generator,
            chunker,
            config,
        })
    }

    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Chunk, embed and store a document
    ///
    /// # Arguments
    /// * `source_id` - Identifier of the document, recorded on every chunk
    /// * `text` - The document content
    /// * `metadata` - Extra payload copied onto every chunk (e.g. `symbol`, `market`)
    ///
    /// # Returns
    /// * Entry ids of the stored chunks, in document order
    pub async fn index_text(
        &self,
        source_id: &str,
        text: &str,
        metadata: Metadata,
    ) -> RagResult<Vec<Uuid>> {
        let chunks = self.chunker.chunk(source_id, text);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedder.max_batch_size().max(1)) {
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }
        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "{} returned {} embeddings for {} chunks",
                self.embedder.name(),
                vectors.len(),
                texts.len()
            )));
        }

        let payloads = chunks
            .into_iter()
            .map(|chunk| {
                let mut payload = metadata.clone();
                payload
                    .entry(SOURCE_KEY)
                    .or_insert_with(|| Value::from(source_id));
                payload.insert(SOURCE_ID_KEY.into(), source_id.into());
                payload.insert("chunk_index".into(), chunk.index_in_source.into());
                payload.insert("total_chunks".into(), chunk.total_chunks.into());
                payload.insert("char_start".into(), chunk.char_start.into());
                payload.insert("char_end".into(), chunk.char_end.into());
                payload.insert(TEXT_KEY.into(), chunk.text.into());
                payload
            })
            .collect();

        let ids = self.store.add(vectors, payloads).await?;
        info!(source_id, chunks = ids.len(), "indexed document");
        Ok(ids)
    }

    /// Retrieve ranked context for a query
    pub async fn retrieve(&self, query: &str, top_k: usize) -> RagResult<Vec<RankedContext>> {
        self.retrieve_with(query, top_k, None, None).await
    }

    /// Retrieve with an optional filter and deadline
    ///
    /// The query is embedded before the store is touched, so a slow
    /// provider never holds the store lock.
    ///
    /// # Errors
    /// `UpstreamTimeout` when embedding does not finish before `deadline`.
    pub async fn retrieve_with(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
        deadline: Option<Instant>,
    ) -> RagResult<Vec<RankedContext>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = with_deadline(deadline, "embedding", self.embedder.embed(query)).await?;
        let hits = self.store.search(&embedding, top_k, filter).await?;
        debug!(top_k, found = hits.len(), "retrieved context");
        Ok(hits.into_iter().map(RankedContext::from_hit).collect())
    }

    /// Render ranked context as citable text within the character budget
    pub fn generate_context(&self, ranked: &[RankedContext]) -> String {
        render_context(ranked, self.config.context_char_budget).0
    }

    /// Build an augmented prompt with retrieved context
    pub fn build_prompt(query: &str, context: &str) -> String {
        let context = if context.is_empty() {
            "(no relevant context found)"
        } else {
            context
        };
        format!(
            "Answer the question using the information below. Cite the numbered \
             context entries you rely on, like [1].\n\n\
             ### Context:\n{context}\n\n\
             ### Question:\n{query}\n\n\
             ### Answer:\n"
        )
    }

    /// Answer a question using the configured deadline
    pub async fn answer(&self, query: &str, top_k: usize) -> RagResult<Answer> {
        let deadline = deadline_after(self.config.timeout_secs);
        self.answer_with(query, top_k, None, deadline).await
    }

    /// Answer a question
    ///
    /// Retrieval failures are errors. A generator failure or timeout after
    /// retrieval succeeded yields a degraded answer that still carries the
    /// context and sources.
    pub async fn answer_with(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
        deadline: Option<Instant>,
    ) -> RagResult<Answer> {
        let ranked = self.retrieve_with(query, top_k, filter, deadline).await?;
        let (context, kept) = render_context(&ranked, self.config.context_char_budget);
        let sources = kept
            .iter()
            .enumerate()
            .map(|(i, ctx)| SourceRef {
                citation: i + 1,
                id: ctx.id,
                source: ctx.source.clone(),
                score: ctx.score,
            })
            .collect();

        let prompt = Self::build_prompt(query, &context);
        match with_deadline(deadline, "generation", self.generator.generate(&prompt)).await {
            Ok(answer) => Ok(Answer {
                answer,
                context,
                sources,
                generation_error: None,
            }),
            Err(err) => {
                warn!(generator = self.generator.name(), error = %err, "generation failed, returning context only");
                Ok(Answer {
                    answer: format!("{DEGRADED_ANSWER_PREFIX}: {err}"),
                    context,
                    sources,
                    generation_error: Some(err.to_string()),
                })
            }
        }
    }
}

async fn with_deadline<T>(
    deadline: Option<Instant>,
    operation: &'static str,
    call: impl Future<Output = RagResult<T>> + Send,
) -> RagResult<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| RagError::UpstreamTimeout { operation })?,
        None => call.await,
    }
}

/// Sort by score, drop duplicate texts, render `[i] (source=..., score=...) text`
/// blocks and keep the best-scored blocks that fit in `budget` characters.
///
/// # Returns
/// * The rendered context and the entries it cites, in citation order
pub fn render_context(ranked: &[RankedContext], budget: usize) -> (String, Vec<&RankedContext>) {
    let mut ordered: Vec<&RankedContext> = ranked.iter().filter(|c| !c.text.is_empty()).collect();
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    ordered.retain(|c| seen.insert(c.text.as_str()));

    let mut blocks: Vec<String> = Vec::new();
    let mut kept = Vec::new();
    let mut used = 0;
    for ctx in ordered {
        let block = format!(
            "[{}] (source={}, score={:.4}) {}",
            kept.len() + 1,
            ctx.source,
            ctx.score,
            ctx.text
        );
        let separator = if blocks.is_empty() { 0 } else { 2 };
        let cost = block.chars().count() + separator;

        if used + cost <= budget {
            used += cost;
            blocks.push(block);
            kept.push(ctx);
        } else {
            if blocks.is_empty() {
                // Even the best entry is too long: keep a truncated copy.
                blocks.push(block.chars().take(budget).collect());
                kept.push(ctx);
            }
            break;
        }
    }

    (blocks.join("\n\n"), kept)
}
