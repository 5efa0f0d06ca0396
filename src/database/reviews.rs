//! Review storage and similarity search backed by PostgreSQL + pgvector

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::core::{CorpusStats, CorpusStore, EmbeddingVector, Match, Review};
use crate::database::PostgresPool;
use crate::error::{Error, Result};

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    professor: String,
    university: String,
    subject: String,
    review: String,
    stars: i32,
    embedding: Option<Vector>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            professor: row.professor,
            university: row.university,
            subject: row.subject,
            text: row.review,
            stars: row.stars,
            embedding: row.embedding.map(|v| v.to_vec()),
            created_at: row.created_at,
        }
    }
}

/// Corpus store backed by the `professor_reviews` table
#[derive(Clone)]
pub struct PgCorpusStore {
    pg_pool: PostgresPool,
    dimensions: usize,
}

impl PgCorpusStore {
    /// Create a new store; `dimensions` must match the migrated column width
    pub fn new(pg_pool: PostgresPool, dimensions: usize) -> Self {
        PgCorpusStore { pg_pool, dimensions }
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

/// Constraint failures become `StorageConstraintViolation`; anything else
/// (connectivity, timeouts) stays a database error.
fn map_write_error(id: Uuid, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::StorageConstraintViolation(format!("review {} already exists", id))
        }
        sqlx::Error::Database(ref db) if db.is_check_violation() => {
            Error::StorageConstraintViolation(format!("review {}: {}", id, db.message()))
        }
        other => Error::Database(other),
    }
}

#[async_trait]
impl CorpusStore for PgCorpusStore {
    fn id(&self) -> &str {
        "postgres"
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

        #[derive(FromRow)]
        struct ReviewWithScore {
            #[sqlx(flatten)]
            review: ReviewRow,
            similarity: f64,
        }

        let embedding = Vector::from(embedding.to_vec());

        let results: Vec<ReviewWithScore> = sqlx::query_as(r#"
            SELECT
                id, professor, university, subject, review, stars,
                NULL::vector AS embedding, created_at,
                1 - (embedding <=> $1) AS similarity
            FROM professor_reviews
            WHERE embedding IS NOT NULL
            AND 1 - (embedding <=> $1) >= $2
            ORDER BY embedding <=> $1
            LIMIT $3
        "#)
        .bind(&embedding)
        .bind(threshold as f64)
        .bind(limit as i64)
        .fetch_all(&self.pg_pool)
        .await?;

        debug!("pgvector query returned {} matches", results.len());

        Ok(results
            .into_iter()
            .map(|r| Match::new(&Review::from(r.review), r.similarity as f32))
            .collect())
    }

    async fn insert(&self, review: Review, embedding: Option<EmbeddingVector>) -> Result<Review> {
        review.validate()?;
        if let Some(ref emb) = embedding {
            self.check_dimensions(emb)?;
        }

        let embedding_vec = embedding.clone().map(Vector::from);

        sqlx::query(r#"
            INSERT INTO professor_reviews (id, professor, university, subject, review, stars, embedding, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#)
        .bind(review.id)
        .bind(&review.professor)
        .bind(&review.university)
        .bind(&review.subject)
        .bind(&review.text)
        .bind(review.stars)
        .bind(embedding_vec)
        .bind(review.created_at)
        .execute(&self.pg_pool)
        .await
        .map_err(|e| map_write_error(review.id, e))?;

        Ok(Review { embedding, ..review })
    }

    async fn set_embedding(&self, id: Uuid, embedding: EmbeddingVector) -> Result<()> {
        self.check_dimensions(&embedding)?;

        let result = sqlx::query("UPDATE professor_reviews SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(Vector::from(embedding))
            .execute(&self.pg_pool)
            .await
            .map_err(|e| map_write_error(id, e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("review {}", id)));
        }

        Ok(())
    }

    async fn fetch_unembedded(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(r#"
            SELECT id, professor, university, subject, review, stars, embedding, created_at
            FROM professor_reviews
            WHERE embedding IS NULL
              AND ($1::uuid IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
        "#)
        .bind(after)
        .bind(limit as i64)
        .fetch_all(&self.pg_pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(
            "SELECT id, professor, university, subject, review, stars, embedding, created_at FROM professor_reviews WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pg_pool)
        .await?;

        Ok(row.map(Review::from))
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let (total, embedded): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(embedding) FROM professor_reviews"
        )
        .fetch_one(&self.pg_pool)
        .await?;

        Ok(CorpusStats { total, embedded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::{init_pool, init_pool_for_migrations, migrations};
    use secrecy::SecretString;

    const DIMENSIONS: usize = 768;

    async fn store() -> PgCorpusStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let config = DatabaseConfig {
            url: SecretString::from(url),
            ..DatabaseConfig::default()
        };
        let setup = init_pool_for_migrations(&config).await.unwrap();
        migrations::run(&setup, DIMENSIONS).await.unwrap();
        PgCorpusStore::new(init_pool(&config).await.unwrap(), DIMENSIONS)
    }

    fn axis(i: usize) -> EmbeddingVector {
        let mut v = vec![0.0; DIMENSIONS];
        v[i] = 1.0;
        v
    }

    async fn remove(store: &PgCorpusStore, id: Uuid) {
        sqlx::query("DELETE FROM professor_reviews WHERE id = $1")
            .bind(id)
            .execute(&store.pg_pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL pointing at PostgreSQL with pgvector
    async fn test_insert_and_query() {
        let store = store().await;
        let review = Review::new("Dr. Pg", "State University", "Databases", "Clear.", 5);
        let stored = store.insert(review, Some(axis(7))).await.unwrap();
        assert_eq!(stored.embedding.as_deref().map(<[f32]>::len), Some(DIMENSIONS));

        let matches = store.query(&axis(7), 0.99, 100).await.unwrap();
        let hit = matches.iter().find(|m| m.review_id == stored.id).unwrap();
        assert!(hit.score > 0.99);
        assert_eq!(hit.review.professor, "Dr. Pg");

        let duplicate = store.insert(stored.clone(), None).await.unwrap_err();
        assert!(matches!(duplicate, Error::StorageConstraintViolation(_)));

        remove(&store, stored.id).await;
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL pointing at PostgreSQL with pgvector
    async fn test_fetch_unembedded_then_set_embedding() {
        let store = store().await;
        let review = Review::new("Dr. Pending", "State University", "Databases", "Fair.", 3);
        let stored = store.insert(review, None).await.unwrap();

        let mut cursor = None;
        let mut found = false;
        loop {
            let page = store.fetch_unembedded(cursor, 50).await.unwrap();
            let Some(last) = page.last() else { break };
            cursor = Some(last.id);
            if page.iter().any(|r| r.id == stored.id) {
                found = true;
                break;
            }
        }
        assert!(found);

        store.set_embedding(stored.id, axis(3)).await.unwrap();
        let fetched = store.get(stored.id).await.unwrap().unwrap();
        assert!(fetched.embedding.is_some());

        let page = store.fetch_unembedded(None, 1000).await.unwrap();
        assert!(page.iter().all(|r| r.id != stored.id));

        remove(&store, stored.id).await;
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL pointing at PostgreSQL with pgvector
    async fn test_wrong_width_rejected() {
        let store = store().await;
        let review = Review::new("Dr. Narrow", "State University", "Databases", "Ok.", 4);
        let err = store.insert(review, Some(vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, Error::StorageConstraintViolation(_)));
        assert!(matches!(
            store.query(&[1.0, 0.0], 0.0, 5).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
