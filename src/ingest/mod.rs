//! Ingestion - getting reviews and their embeddings into the corpus

mod backfill;
mod seed;

pub use backfill::{BackfillReport, Backfiller};
pub use seed::{insert_review, load_reviews, parse_reviews, seed, SeedReport};
