//! Database module - review corpus persistence
//!
//! - PostgreSQL with pgvector: the production corpus, cosine search in SQL
//! - In-memory: same contract, for tests and local dry runs

mod in_memory;
mod postgres;
mod reviews;

pub use in_memory::{cosine_similarity, InMemoryCorpusStore};
pub use postgres::{init_pool, init_pool_for_migrations, migrations, PostgresPool};
pub use reviews::PgCorpusStore;
