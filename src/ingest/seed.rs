//! Loading reviews into the corpus
//!
//! Seed files look like `{"reviews": [{"professor", "university", "subject",
//! "stars", "review"}, ...]}`.

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::core::{CorpusStore, EmbeddingProvider, NewReview, Review};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct SeedFile {
    reviews: Vec<NewReview>,
}

/// Counters for one seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Reviews stored
    pub inserted: usize,
    /// Of those, stored with an embedding
    pub embedded: usize,
    /// Reviews rejected (invalid or duplicate)
    pub skipped: usize,
}

/// Read a seed file
pub fn load_reviews(path: impl AsRef<Path>) -> Result<Vec<NewReview>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_reviews(&content)
}

/// Parse seed file content
pub fn parse_reviews(content: &str) -> Result<Vec<NewReview>> {
    let file: SeedFile = serde_json::from_str(content)
        .map_err(|e| Error::InvalidInput(format!("Invalid seed file: {}", e)))?;
    Ok(file.reviews)
}

/// Store one review, embedding it first when `embed_now` is set.
///
/// An embedding failure does not lose the review: it is stored without an
/// embedding and left for the backfill.
pub async fn insert_review(
    store: &dyn CorpusStore,
    embedder: &dyn EmbeddingProvider,
    review: Review,
    embed_now: bool,
) -> Result<Review> {
    review.validate()?;

    let embedding = if embed_now {
        match embedder.embed(&review.embedding_text()).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(
                    review_id = %review.id,
                    stage = "embedding",
                    error = %e,
                    "Storing review without embedding, backfill will retry"
                );
                None
            }
        }
    } else {
        None
    };

    store.insert(review, embedding).await
}

/// Insert every review; invalid entries and duplicates are reported and skipped
pub async fn seed(
    store: &dyn CorpusStore,
    embedder: &dyn EmbeddingProvider,
    reviews: Vec<NewReview>,
    embed_now: bool,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (index, new_review) in reviews.into_iter().enumerate() {
        let professor = new_review.professor.clone();
        let review = match new_review.into_review() {
            Ok(review) => review,
            Err(e) => {
                warn!(index, professor = %professor, error = %e, "Skipping invalid review");
                report.skipped += 1;
                continue;
            }
        };

        match insert_review(store, embedder, review, embed_now).await {
            Ok(stored) => {
                report.inserted += 1;
                if stored.embedding.is_some() {
                    report.embedded += 1;
                }
            }
            Err(e @ Error::StorageConstraintViolation(_)) => {
                warn!(index, professor = %professor, error = %e, "Skipping duplicate review");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        inserted = report.inserted,
        embedded = report.embedded,
        skipped = report.skipped,
        "Seeding finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryCorpusStore;
    use crate::testing::FakeEmbedder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SEED: &str = r#"{
        "reviews": [
            {"professor": "Dr. Emily Johnson", "university": "MIT", "subject": "Physics", "stars": 5, "review": "Great professor, explains concepts clearly."},
            {"professor": "Dr. Michael Chen", "subject": "Computer Science", "stars": 4, "review": "Challenging but fair."},
            {"professor": "Dr. Nobody", "subject": "History", "stars": 9, "review": "Out of range."}
        ]
    }"#;

    #[test]
    fn test_load_reviews_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let reviews = load_reviews(file.path()).unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(reviews[0].text, "Great professor, explains concepts clearly.");
        assert_eq!(reviews[1].university, "");
    }

    #[test]
    fn test_load_reviews_errors() {
        assert!(matches!(
            load_reviews("/nonexistent/reviews.json"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(parse_reviews("[]"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_seed_without_embedding() {
        let store = InMemoryCorpusStore::new(2);
        let embedder = FakeEmbedder::new(vec![1.0, 0.0]);

        let report = seed(&store, &embedder, parse_reviews(SEED).unwrap(), false)
            .await
            .unwrap();
        assert_eq!(report, SeedReport { inserted: 2, embedded: 0, skipped: 1 });
        assert!(embedder.seen().is_empty());
        assert_eq!(store.stats().await.unwrap().pending(), 2);
    }

    #[tokio::test]
    async fn test_seed_with_embedding() {
        let store = InMemoryCorpusStore::new(2);
        let embedder = FakeEmbedder::new(vec![1.0, 0.0]);

        let report = seed(&store, &embedder, parse_reviews(SEED).unwrap(), true)
            .await
            .unwrap();
        assert_eq!(report.embedded, 2);
        assert_eq!(
            embedder.seen()[0],
            "Dr. Emily Johnson MIT Physics Great professor, explains concepts clearly."
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_review() {
        let store = InMemoryCorpusStore::new(2);
        let review = Review::new("Dr. Lee", "UCLA", "Math", "Fair grader.", 4);

        let stored = insert_review(&store, &FakeEmbedder::failing(2), review, true)
            .await
            .unwrap();
        assert!(stored.embedding.is_none());
        assert!(store.get(stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_ids_skipped() {
        let store = InMemoryCorpusStore::new(2);
        let embedder = FakeEmbedder::new(vec![1.0, 0.0]);
        let json = r#"{"reviews": [
            {"id": "7f9c24e8-3b12-4fef-91e0-3f4c8f1b7a10", "professor": "A", "subject": "X", "stars": 3, "review": "ok"},
            {"id": "7f9c24e8-3b12-4fef-91e0-3f4c8f1b7a10", "professor": "B", "subject": "Y", "stars": 4, "review": "fine"}
        ]}"#;

        let report = seed(&store, &embedder, parse_reviews(json).unwrap(), false)
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 1);
    }
}
