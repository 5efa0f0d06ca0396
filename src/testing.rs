//! Scripted collaborators for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::core::{
    CorpusStats, CorpusStore, EmbeddingProvider, EmbeddingVector, GenerationProvider,
    GenerationStream, Match, Prompt, Review,
};
use crate::error::{Error, Result};

/// Embedder returning canned vectors, keyed by exact input text
pub struct FakeEmbedder {
    dimensions: usize,
    vectors: HashMap<String, EmbeddingVector>,
    fallback: EmbeddingVector,
    fail: bool,
    pub seen: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new(fallback: EmbeddingVector) -> Self {
        FakeEmbedder {
            dimensions: fallback.len(),
            vectors: HashMap::new(),
            fallback,
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `UpstreamUnavailable`
    pub fn failing(dimensions: usize) -> Self {
        FakeEmbedder {
            fail: true,
            ..Self::new(vec![0.0; dimensions])
        }
    }

    pub fn with(mut self, text: &str, vector: EmbeddingVector) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embedding"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.seen.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::embedding_unavailable("connection refused"));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Generator replaying fixed fragments and recording every prompt it receives
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    fail_after: Option<usize>,
    fail_start: bool,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn new(fragments: &[&str]) -> Self {
        ScriptedGenerator {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_after: None,
            fail_start: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Emit `n` fragments, then a terminal error
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail the initial call
    pub fn unavailable() -> Self {
        ScriptedGenerator {
            fail_start: true,
            ..Self::new(&[])
        }
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.stream(prompt).await?.collect_text().await
    }

    async fn stream(&self, prompt: &Prompt) -> Result<GenerationStream> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.fail_start {
            return Err(Error::generation_unavailable("connection refused"));
        }

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(Error::generation_unavailable("stream reset")));
        }
        Ok(GenerationStream::from_fragments(items))
    }
}

/// Store whose every operation fails like a dropped connection
pub struct BrokenStore;

fn broken<T>() -> Result<T> {
    Err(Error::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl CorpusStore for BrokenStore {
    fn id(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        2
    }

    async fn query(&self, _: &[f32], _: f32, _: usize) -> Result<Vec<Match>> {
        broken()
    }

    async fn insert(&self, _: Review, _: Option<EmbeddingVector>) -> Result<Review> {
        broken()
    }

    async fn set_embedding(&self, _: Uuid, _: EmbeddingVector) -> Result<()> {
        broken()
    }

    async fn fetch_unembedded(&self, _: Option<Uuid>, _: usize) -> Result<Vec<Review>> {
        broken()
    }

    async fn get(&self, _: Uuid) -> Result<Option<Review>> {
        broken()
    }

    async fn stats(&self) -> Result<CorpusStats> {
        broken()
    }
}

/// Counts page fetches against a wrapped store
pub struct CountingStore<S> {
    pub inner: S,
    pub fetches: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        CountingStore {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: CorpusStore> CorpusStore for CountingStore<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn query(&self, embedding: &[f32], threshold: f32, limit: usize) -> Result<Vec<Match>> {
        self.inner.query(embedding, threshold, limit).await
    }

    async fn insert(&self, review: Review, embedding: Option<EmbeddingVector>) -> Result<Review> {
        self.inner.insert(review, embedding).await
    }

    async fn set_embedding(&self, id: Uuid, embedding: EmbeddingVector) -> Result<()> {
        self.inner.set_embedding(id, embedding).await
    }

    async fn fetch_unembedded(&self, after: Option<Uuid>, limit: usize) -> Result<Vec<Review>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_unembedded(after, limit).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Review>> {
        self.inner.get(id).await
    }

    async fn stats(&self) -> Result<CorpusStats> {
        self.inner.stats().await
    }
}

/// A review with a recognizable professor name
pub fn review(professor: &str, text: &str, stars: i32) -> Review {
    Review::new(professor, "State University", "Computer Science", text, stars)
}
