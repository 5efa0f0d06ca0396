//! Query-time retrieval: normalize, embed, nearest-neighbour search
//!
//! Failures in the embedding service or the store never abort a chat request.
//! They are logged and reported as [`Retrieval::Degraded`], which carries no
//! matches, so the caller falls back to an ungrounded answer.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::normalizer;
use crate::core::{CorpusStore, EmbeddingProvider, Match, DEFAULT_THRESHOLD};

/// Pipeline stage a degraded retrieval failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    Embedding,
    Search,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStage::Embedding => write!(f, "embedding"),
            RetrievalStage::Search => write!(f, "search"),
        }
    }
}

/// Outcome of a retrieval
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// Matches clearing the threshold, best first; possibly empty
    Matches(Vec<Match>),
    /// Retrieval failed; the request proceeds without context
    Degraded {
        stage: RetrievalStage,
        cause: String,
    },
}

impl Retrieval {
    /// Matches, empty when degraded
    pub fn matches(&self) -> &[Match] {
        match self {
            Retrieval::Matches(matches) => matches,
            Retrieval::Degraded { .. } => &[],
        }
    }

    pub fn into_matches(self) -> Vec<Match> {
        match self {
            Retrieval::Matches(matches) => matches,
            Retrieval::Degraded { .. } => Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Retrieval::Degraded { .. })
    }
}

/// Finds the reviews most relevant to a free-text query
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl Retriever {
    pub fn new(store: Arc<dyn CorpusStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Retriever {
            store,
            embedder,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the minimum similarity
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Retrieve up to `limit` matches for `raw_query`
    pub async fn retrieve(&self, raw_query: &str, limit: usize) -> Retrieval {
        let normalized = normalizer::normalize(raw_query);
        // A query made only of stop-words still carries some meaning
        let text = if normalized.is_empty() {
            raw_query
        } else {
            normalized.as_str()
        };

        let embedding = match self.embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => return degraded(RetrievalStage::Embedding, e),
        };

        match self.store.query(&embedding, self.threshold, limit).await {
            Ok(matches) => {
                debug!(
                    query = %text,
                    matches = matches.len(),
                    threshold = self.threshold,
                    "Retrieved reviews"
                );
                Retrieval::Matches(matches)
            }
            Err(e) => degraded(RetrievalStage::Search, e),
        }
    }
}

fn degraded(stage: RetrievalStage, error: crate::error::Error) -> Retrieval {
    warn!(stage = %stage, error = %error, "Retrieval degraded, answering without context");
    Retrieval::Degraded {
        stage,
        cause: error.to_string(),
    }
}
