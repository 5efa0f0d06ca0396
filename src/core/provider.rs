//! LLM provider trait - Abstract interface for text generation backends
//!
//! Streaming output is a lazy, pull-based [`GenerationStream`]: nothing is
//! fetched until the consumer polls, and dropping (or closing) the stream
//! releases the underlying connection.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::types::Message;
use crate::error::Result;

/// Input to a generation call
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// System instructions
    pub system: String,
    /// Conversation turns; the last one is the grounded user turn
    pub turns: Vec<Message>,
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Cap on generated tokens
    pub max_output_tokens: Option<u32>,
}

type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Ordered text fragments of a streamed response.
///
/// Concatenating the fragments in emission order reconstructs the response.
/// An `Err` item is terminal: the stream closes itself right after yielding it.
pub struct GenerationStream {
    inner: Option<FragmentStream>,
}

impl GenerationStream {
    /// Wrap a fragment stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        GenerationStream {
            inner: Some(Box::pin(stream)),
        }
    }

    /// Stream over fragments already in memory
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Result<String>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(fragments))
    }

    /// Drop the upstream source; later polls yield `None`
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Whether the upstream source has been released
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the stream into a single string
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for GenerationStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.inner = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Output of [`GenerationProvider::generate`]
#[derive(Debug)]
pub enum Generated {
    /// Whole response
    Text(String),
    /// Incremental fragments
    Stream(GenerationStream),
}

/// Abstract interface for LLM providers
///
/// Implement this trait to add support for new generation backends; tests
/// substitute scripted fakes.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Model identifier
    fn model(&self) -> &str;

    /// Generate a response (non-streaming)
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Generate a streaming response. Errors here mean the initial call failed.
    async fn stream(&self, prompt: &Prompt) -> Result<GenerationStream>;

    /// Generate either way
    async fn generate(&self, prompt: &Prompt, streaming: bool) -> Result<Generated> {
        if streaming {
            self.stream(prompt).await.map(Generated::Stream)
        } else {
            self.complete(prompt).await.map(Generated::Text)
        }
    }
}
