//! Core module - Fundamental traits and types for profrag
//!
//! External collaborators (embedding service, generation service, review
//! store) sit behind these traits and are injected as `Arc<dyn Trait>`, so
//! every pipeline stage can run against fakes.

pub mod embedding;
pub mod provider;
pub mod storage;
pub mod types;

// Re-export core traits for convenient access
pub use embedding::EmbeddingProvider;
pub use provider::{Generated, GenerationOptions, GenerationProvider, GenerationStream, Prompt};
pub use storage::{CorpusStore, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
pub use types::*;
