//! PostgreSQL database connection and migrations

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// Initialize the PostgreSQL connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<PostgresPool> {
    init_pool_with_options(config, true).await
}

/// Initialize the PostgreSQL connection pool without pgvector check
/// Use this for running migrations before pgvector is installed
pub async fn init_pool_for_migrations(config: &DatabaseConfig) -> Result<PostgresPool> {
    init_pool_with_options(config, false).await
}

async fn init_pool_with_options(config: &DatabaseConfig, require_pgvector: bool) -> Result<PostgresPool> {
    if config.url.expose_secret().is_empty() {
        return Err(Error::ConfigurationMissing("DATABASE_URL is required".to_string()));
    }

    info!("Initializing PostgreSQL connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(config.url.expose_secret())
        .await?;

    verify_database(&pool, require_pgvector).await?;

    info!("PostgreSQL connection pool initialized successfully");
    Ok(pool)
}

/// Verify database connection and optionally check for required extensions
async fn verify_database(pool: &PgPool, require_pgvector: bool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    if require_pgvector {
        let result: Option<(String,)> = sqlx::query_as(
            "SELECT extname FROM pg_extension WHERE extname = 'vector'"
        )
        .fetch_optional(pool)
        .await?;

        if result.is_none() {
            return Err(Error::Database(sqlx::Error::Configuration(
                "pgvector extension is not installed. Run: profrag migrate".into()
            )));
        }
    }

    Ok(())
}

/// Database migrations
pub mod migrations {
    use super::*;
    use tracing::warn;

    /// Run all migrations. `dimensions` fixes the width of the embedding column.
    pub async fn run(pool: &PgPool, dimensions: usize) -> Result<()> {
        info!("Running database migrations");

        // Requires superuser or an extension already available to the role
        match sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
        {
            Ok(_) => info!("pgvector extension enabled"),
            Err(e) => {
                warn!("Could not create pgvector extension: {}. Vector features may not work.", e);
                warn!("If you need vector support, run as superuser: CREATE EXTENSION vector;");
            }
        }

        // DDL cannot take bind parameters; dimensions is a usize so formatting is safe
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS professor_reviews (
                id UUID PRIMARY KEY,
                professor TEXT NOT NULL,
                university TEXT NOT NULL DEFAULT '',
                subject TEXT NOT NULL DEFAULT '',
                review TEXT NOT NULL,
                stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
                embedding vector({dimensions}),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_professor_reviews_professor ON professor_reviews(professor)")
            .execute(pool)
            .await?;

        // Keeps the backfill's "embedding IS NULL ORDER BY id" page reads cheap
        sqlx::query(r#"
            CREATE INDEX IF NOT EXISTS idx_professor_reviews_unembedded ON professor_reviews(id)
            WHERE embedding IS NULL
        "#)
        .execute(pool)
        .await?;

        sqlx::query(r#"
            CREATE INDEX IF NOT EXISTS idx_professor_reviews_embedding ON professor_reviews
            USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)
        "#)
        .execute(pool)
        .await
        .ok(); // Ignore if not enough data or vector type not available

        info!("Database migrations completed");
        Ok(())
    }
}
