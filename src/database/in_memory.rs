//! Process-local corpus store
//!
//! Brute-force cosine search over a `BTreeMap`, so paging by id has the same
//! order as the PostgreSQL store. Writers take the lock exclusively
//! (last writer wins); readers share it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{CorpusStats, CorpusStore, EmbeddingVector, Match, Review};
use crate::error::{Error, Result};

/// In-memory corpus store
pub struct InMemoryCorpusStore {
    reviews: RwLock<BTreeMap<Uuid, Review>>,
    dimensions: usize,
}

impl InMemoryCorpusStore {
    /// Create an empty store accepting `dimensions`-wide embeddings
    pub fn new(dimensions: usize) -> Self {
        InMemoryCorpusStore {
            reviews: RwLock::new(BTreeMap::new()),
            dimensions,
        }
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::StorageConstraintViolation(format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// Cosine similarity; zero vectors are dissimilar to everything
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[async_trait]
impl CorpusStore for InMemoryCorpusStore {
    fn id(&self) -> &str {
        "memory"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn query(&self, embedding: &[f32], threshold: f32, limit: usize) -> Result<Vec<Match>> {
        if embedding.len() != self.dimensions {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dimensions, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let reviews = self.reviews.read().await;

        let mut scored: Vec<(f32, &Review)> = reviews
            .values()
            .filter_map(|review| {
                let stored = review.embedding.as_deref()?;
                let score = cosine_similarity(embedding, stored);
                (score >= threshold).then_some((score, review))
            })
            .collect();

        // Ties fall back to id order so results are deterministic
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, review)| Match::new(review, score))
            .collect())
    }

    async fn insert(&self, review: Review, embedding: Option<EmbeddingVector>) -> Result<Review> {
        review.validate()?;
        if let Some(ref emb) = embedding {
            self.check_dimensions(emb)?;
        }

        let mut reviews = self.reviews.write().await;
        if reviews.contains_key(&review.id) {
            return Err(Error::StorageConstraintViolation(format!(
                "review {} already exists",
                review.id
            )));
        }

        let stored = Review { embedding, ..review };
        reviews.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_embedding(&self, id: Uuid, embedding: EmbeddingVector) -> Result<()> {
        self.check_dimensions(&embedding)?;

        let mut reviews = self.reviews.write().await;
        let review = reviews
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("review {}", id)))?;
        review.embedding = Some(embedding);
        Ok(())
    }

    async fn fetch_unembedded(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<Review>> {
        use std::ops::Bound;

        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let reviews = self.reviews.read().await;
        Ok(reviews
            .range((lower, Bound::Unbounded))
            .map(|(_, review)| review)
            .filter(|review| review.embedding.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let reviews = self.reviews.read().await;
        let embedded = reviews.values().filter(|r| r.embedding.is_some()).count();
        Ok(CorpusStats {
            total: reviews.len() as i64,
            embedded: embedded as i64,
        })
    }
}
