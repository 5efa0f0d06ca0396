//! # profrag
//!
//! Retrieval-augmented chat assistant that answers questions about professors
//! from a corpus of student reviews.
//!
//! ## Pipeline
//!
//! - **Retrieval:** the latest question is normalized, embedded with Gemini and
//!   matched against review embeddings in PostgreSQL + pgvector
//! - **Grounding:** matches are rendered into a context block attached to the
//!   latest user turn
//! - **Generation:** Gemini streams the answer, relayed to the client as it
//!   arrives
//! - **Ingestion:** reviews are seeded without embeddings and filled in by a
//!   separate backfill process

pub mod chat;
pub mod config;
pub mod core;
pub mod database;
pub mod error;
mod gemini;
pub mod gateway;
pub mod generation;
pub mod ingest;
pub mod logging;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::ChatService;
pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
