//! Text chunking service implementation
//!
//! Splits long documents into overlapping, sentence-aware windows measured
//! in characters, so multi-byte text (Korean filings, Japanese news) is never
//! cut inside a UTF-8 sequence.

use crate::domain::errors::RagResult;
use crate::domain::models::{Chunk, ChunkingConfig};

/// Characters that end a sentence.
const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', '\n', '。'];

/// Sentence-aware text chunker
///
/// Walks the text in windows of `max_size` characters. A window whose right
/// edge falls mid-sentence is pulled back to the nearest terminator, looking
/// no further than `max_size / 2`; the next window starts `overlap`
/// characters before the previous end.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a new chunker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new chunker with custom configuration
    ///
    /// # Errors
    /// `RagError::Config` when `overlap >= max_size` or `max_size == 0`.
    pub fn with_config(config: ChunkingConfig) -> RagResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk `text` into pieces suitable for embedding
    ///
    /// # Arguments
    /// * `source_id` - Identifier recorded on every chunk for lineage
    /// * `text` - The document text
    ///
    /// # Returns
    /// * Chunks in document order; empty when `text` is empty
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let spans = self.spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(index_in_source, span)| Chunk {
                source_id: source_id.to_string(),
                text: text[offsets[span.start]..offsets[span.end]].to_string(),
                index_in_source,
                total_chunks,
                char_start: span.start,
                char_end: span.end,
                truncated_at_boundary: span.truncated,
            })
            .collect()
    }

    /// Compute window boundaries in char positions.
    fn spans(&self, text: &str) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        if len == 0 {
            return Vec::new();
        }

        let max_size = self.config.max_size;
        let overlap = self.config.overlap;
        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + max_size).min(len);
            let mut truncated = false;

            if end < len && !is_terminator(chars[end - 1]) {
                if let Some(boundary) = snap_to_boundary(&chars, start, end, max_size / 2) {
                    end = boundary;
                    truncated = true;
                }
            }

            spans.push(Span {
                start,
                end,
                truncated,
            });

            if end >= len {
                break;
            }

            // Always move forward, even when overlap reaches back past `start`.
            start = end.saturating_sub(overlap).max(start + 1);
        }

        spans
    }
}

/// Chunk `text` with an ad-hoc configuration.
///
/// # Errors
/// `RagError::Config` when `overlap >= max_size` or `max_size == 0`.
pub fn chunk(text: &str, max_size: usize, overlap: usize) -> RagResult<Vec<Chunk>> {
    let chunker = Chunker::with_config(ChunkingConfig::new(max_size, overlap))?;
    Ok(chunker.chunk("", text))
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    truncated: bool,
}

fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}

/// Find the latest cut position in `(start, end)` that follows a terminator,
/// searching back at most `max_back` characters.
fn snap_to_boundary(chars: &[char], start: usize, end: usize, max_back: usize) -> Option<usize> {
    let lower = end.saturating_sub(max_back).max(start + 1);
    (lower..end).rev().find(|&cut| is_terminator(chars[cut - 1]))
}
