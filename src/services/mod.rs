//! Application services orchestrating domain ports.

pub mod rag_service;

pub use rag_service::{deadline_after, render_context, RagPipeline, DEGRADED_ANSWER_PREFIX};
