//! Domain layer: errors, models and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RagError, RagResult};
