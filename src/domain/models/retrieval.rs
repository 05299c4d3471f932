//! Retrieval pipeline results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::{Metadata, SearchHit};

/// Metadata key holding the chunk text.
pub const TEXT_KEY: &str = "text";
/// Metadata key holding a human-readable source label.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the id of the chunked document.
pub const SOURCE_ID_KEY: &str = "source_id";

/// A search hit resolved to citable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedContext {
    pub id: Uuid,
    pub score: f32,
    pub text: String,
    /// Label shown in citations.
    pub source: String,
    pub metadata: Metadata,
}

impl RankedContext {
    /// Build from a store hit. Falls back to the entry id when the
    /// metadata carries no source label.
    pub fn from_hit(hit: SearchHit) -> Self {
        let text = hit
            .metadata
            .get(TEXT_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let source = [SOURCE_KEY, SOURCE_ID_KEY]
            .iter()
            .find_map(|key| hit.metadata.get(*key).and_then(|v| v.as_str()))
            .map_or_else(|| hit.id.to_string(), str::to_string);

        Self {
            id: hit.id,
            score: hit.score,
            text,
            source,
            metadata: hit.metadata,
        }
    }
}

/// A context entry cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// 1-based number used in the rendered context, e.g. `[2]`.
    pub citation: usize,
    pub id: Uuid,
    pub source: String,
    pub score: f32,
}

/// Output of `RagPipeline::answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub context: String,
    pub sources: Vec<SourceRef>,
    /// Set when generation failed and `answer` is the degraded message.
    pub generation_error: Option<String>,
}

impl Answer {
    pub const fn is_degraded(&self) -> bool {
        self.generation_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_falls_back_to_source_id_then_id() {
        let id = Uuid::new_v4();
        let hit = SearchHit {
            id,
            score: 0.9,
            metadata: json!({"text": "hello", "source_id": "note-1"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let ctx = RankedContext::from_hit(hit);
        assert_eq!(ctx.source, "note-1");
        assert_eq!(ctx.text, "hello");

        let bare = RankedContext::from_hit(SearchHit {
            id,
            score: 0.1,
            metadata: Metadata::new(),
        });
        assert_eq!(bare.source, id.to_string());
        assert!(bare.text.is_empty());
    }
}
