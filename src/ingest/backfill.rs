//! Embedding backfill
//!
//! Pages through reviews stored without an embedding, ascending by id, and
//! fills them in one at a time. The cursor only moves forward, so a review
//! whose embedding fails is not retried within the same run; it stays
//! un-embedded and is picked up by the next run.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BackfillConfig;
use crate::core::{CorpusStore, EmbeddingProvider};
use crate::error::Result;

/// Counters for one backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Page fetches, including the final empty one
    pub pages: usize,
    /// Reviews read
    pub fetched: usize,
    /// Embeddings stored
    pub embedded: usize,
    /// Reviews skipped after an error
    pub failed: usize,
}

/// Computes and stores missing review embeddings
pub struct Backfiller {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    interval: Duration,
}

impl Backfiller {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &BackfillConfig,
    ) -> Self {
        Backfiller {
            store,
            embedder,
            batch_size: config.batch_size.max(1),
            interval: config.interval,
        }
    }

    /// Run until a fetch comes back empty
    pub async fn run(&self) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut cursor: Option<Uuid> = None;

        info!(
            batch_size = self.batch_size,
            interval = ?self.interval,
            store = self.store.id(),
            "Backfill started"
        );

        loop {
            let page = self.store.fetch_unembedded(cursor, self.batch_size).await?;
            report.pages += 1;

            if page.is_empty() {
                break;
            }
            report.fetched += page.len();
            cursor = page.last().map(|r| r.id);

            for review in &page {
                let stored = match self.embedder.embed(&review.embedding_text()).await {
                    Ok(embedding) => self.store.set_embedding(review.id, embedding).await,
                    Err(e) => Err(e),
                };

                match stored {
                    Ok(()) => {
                        report.embedded += 1;
                        debug!(review_id = %review.id, professor = %review.professor, "Embedded review");
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            review_id = %review.id,
                            stage = "backfill",
                            error = %e,
                            "Skipping review, it stays pending"
                        );
                    }
                }
            }

            info!(
                page = report.pages,
                embedded = report.embedded,
                failed = report.failed,
                "Backfill page done"
            );

            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }

        info!(
            pages = report.pages,
            fetched = report.fetched,
            embedded = report.embedded,
            failed = report.failed,
            "Backfill finished"
        );
        Ok(report)
    }
}
