//! Text chunking domain models
//!
//! Long notes and reports are split into overlapping segments before
//! embedding. Sizes are counted in characters.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{RagError, RagResult};

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub const fn new(max_size: usize, overlap: usize) -> Self {
        Self { max_size, overlap }
    }

    /// Validate the chunking configuration
    pub fn validate(&self) -> RagResult<()> {
        if self.max_size == 0 {
            return Err(RagError::Config(
                "chunking.max_size must be greater than 0".to_string(),
            ));
        }

        if self.overlap >= self.max_size {
            return Err(RagError::Config(format!(
                "chunking.overlap ({}) must be less than max_size ({})",
                self.overlap, self.max_size
            )));
        }

        Ok(())
    }
}

const fn default_max_size() -> usize {
    1000
}

const fn default_overlap() -> usize {
    200
}

/// A segment of a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier of the document this chunk came from
    pub source_id: String,

    /// The text content of this chunk
    pub text: String,

    /// Position of this chunk within its source (0-based)
    pub index_in_source: usize,

    /// Number of chunks the source was split into
    pub total_chunks: usize,

    /// Character offset of the first character in the source
    pub char_start: usize,

    /// Character offset one past the last character in the source
    pub char_end: usize,

    /// Whether the window was pulled back to a sentence terminator
    pub truncated_at_boundary: bool,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    pub const fn is_last(&self) -> bool {
        self.index_in_source + 1 == self.total_chunks
    }
}
