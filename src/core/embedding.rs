//! Embedding provider trait

use async_trait::async_trait;

use super::types::EmbeddingVector;
use crate::error::Result;

/// Converts text into a fixed-length vector.
///
/// Implementations must return exactly [`dimensions`](Self::dimensions) values
/// or fail with `MalformedResponse`; transport failures are
/// `UpstreamUnavailable`. No caching: every call recomputes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier
    fn model(&self) -> &str;

    /// Embedding dimensionality (D)
    fn dimensions(&self) -> usize;

    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}
