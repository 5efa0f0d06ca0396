//! Storage trait - Abstract interface for the review corpus
//!
//! Two implementations ship with the crate:
//! - `PgCorpusStore`: PostgreSQL + pgvector, cosine distance computed in SQL
//! - `InMemoryCorpusStore`: process-local, used for tests and dry runs
//!
//! Similarity is always computed by the store, never by callers.

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{CorpusStats, EmbeddingVector, Match, Review};
use crate::error::Result;

/// Default minimum similarity for a match
pub const DEFAULT_THRESHOLD: f32 = 0.78;

/// Default number of matches returned by a query
pub const DEFAULT_LIMIT: usize = 5;

/// Abstract interface for the persisted review collection
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Embedding dimensionality (D) this store accepts
    fn dimensions(&self) -> usize;

    /// Nearest-neighbour query.
    ///
    /// Returns matches with `score >= threshold`, sorted by descending score and
    /// truncated to `limit`. Nothing clearing the bar is an empty result, not an
    /// error.
    async fn query(&self, embedding: &[f32], threshold: f32, limit: usize) -> Result<Vec<Match>>;

    /// Insert a new review, optionally with its embedding.
    ///
    /// Fails with `StorageConstraintViolation` on a duplicate id or an
    /// embedding of the wrong length.
    async fn insert(&self, review: Review, embedding: Option<EmbeddingVector>) -> Result<Review>;

    /// Attach (or replace) the embedding of an existing review
    async fn set_embedding(&self, id: Uuid, embedding: EmbeddingVector) -> Result<()>;

    /// Page through reviews lacking an embedding, ascending by id, strictly after `after`
    async fn fetch_unembedded(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<Review>>;

    /// Get a review by ID
    async fn get(&self, id: Uuid) -> Result<Option<Review>>;

    /// Corpus counters
    async fn stats(&self) -> Result<CorpusStats>;
}
