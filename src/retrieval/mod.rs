//! Retrieval module - turning a question into grounding context
//!
//! Provides:
//! - Query normalization (stop-word removal)
//! - Gemini embedding client
//! - Soft-failing nearest-neighbour retrieval
//! - Context block assembly

mod context;
mod embedding;
pub mod normalizer;
mod retriever;

pub use context::{ContextAssembler, DEFAULT_MAX_REVIEW_CHARS, NO_CONTEXT};
pub use embedding::GeminiEmbeddingClient;
pub use normalizer::normalize;
pub use retriever::{Retrieval, RetrievalStage, Retriever};
