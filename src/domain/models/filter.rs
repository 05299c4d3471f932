//! Search predicates.
//!
//! Entries are linked to market entities the same way on every backend:
//! a `symbol` metadata value links the entry `ABOUT` a stock, a `market`
//! value links it `BELONGS_TO` a market.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::Metadata;

/// Relationship between an entry and a named entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Entry discusses a stock symbol.
    About,
    /// Entry belongs to a market.
    BelongsTo,
    /// Free-form relation; resolved from the metadata key of the same name.
    Custom(String),
}

impl Relation {
    /// Label stored in the link table.
    pub fn label(&self) -> String {
        match self {
            Self::About => "ABOUT".to_string(),
            Self::BelongsTo => "BELONGS_TO".to_string(),
            Self::Custom(name) => name.to_uppercase(),
        }
    }

    /// Metadata key a link of this relation is derived from.
    pub fn metadata_key(&self) -> &str {
        match self {
            Self::About => "symbol",
            Self::BelongsTo => "market",
            Self::Custom(name) => name,
        }
    }

    /// Links implied by an entry's metadata.
    pub fn derive_links(metadata: &Metadata) -> Vec<(Self, String)> {
        [Self::About, Self::BelongsTo]
            .into_iter()
            .filter_map(|relation| {
                let target = metadata.get(relation.metadata_key()).and_then(value_as_target)?;
                Some((relation, target))
            })
            .collect()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Restrict results to entries linked to `target` through `relation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter {
    pub relation: Relation,
    pub target: String,
}

/// Optional predicate applied to search candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Every pair must be present with an equal value.
    #[serde(default)]
    pub metadata_equals: Metadata,
    #[serde(default)]
    pub related_to: Option<RelationFilter>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata_equals.insert(key.into(), value.into());
        self
    }

    /// Require a link `relation -> target`.
    #[must_use]
    pub fn related_to(mut self, relation: Relation, target: impl Into<String>) -> Self {
        self.related_to = Some(RelationFilter {
            relation,
            target: target.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metadata_equals.is_empty() && self.related_to.is_none()
    }

    /// Evaluate the metadata equality part.
    pub fn matches_metadata(&self, metadata: &Metadata) -> bool {
        self.metadata_equals
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    /// Evaluate the whole predicate using links derived from metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        if !self.matches_metadata(metadata) {
            return false;
        }
        self.related_to.as_ref().is_none_or(|rel| {
            metadata
                .get(rel.relation.metadata_key())
                .and_then(value_as_target)
                .is_some_and(|target| target.eq_ignore_ascii_case(&rel.target))
        })
    }
}

fn value_as_target(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
