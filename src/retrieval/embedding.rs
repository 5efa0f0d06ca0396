//! Remote embedding generation via the Gemini `embedContent` endpoint
//!
//! Rate-limited (429) and server-side (5xx) failures are retried with
//! exponential backoff until `max_retry_secs` has elapsed. No caching: every
//! call reaches the service.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GoogleConfig;
use crate::core::{EmbeddingProvider, EmbeddingVector};
use crate::error::{Error, Result};
use crate::gemini::{self, Content};

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Embedding client for the Google Generative Language API
#[derive(Clone)]
pub struct GeminiEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
    max_retry: Duration,
}

impl GeminiEmbeddingClient {
    /// Create a new client; fails fast when the API key is absent
    pub fn new(config: &GoogleConfig, dimensions: usize) -> Result<Self> {
        Ok(GeminiEmbeddingClient {
            client: gemini::http_client(config)?,
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
            dimensions,
            timeout: Duration::from_secs(config.timeout_secs),
            max_retry: Duration::from_secs(config.max_retry_secs),
        })
    }

    fn request_body(&self, text: &str) -> EmbedContentRequest {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        EmbedContentRequest {
            model: format!("models/{}", model),
            content: Content::text(None, text),
        }
    }

    /// One attempt, classified for the retry loop
    async fn embed_once(
        &self,
        url: &str,
        text: &str,
    ) -> std::result::Result<EmbeddingVector, backoff::Error<Error>> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| backoff::Error::permanent(Error::embedding_unavailable(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| backoff::Error::permanent(Error::embedding_unavailable(e.to_string())))?;

        if !status.is_success() {
            let err = gemini::status_error("embedding", status, &body);
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(status = %status, "Embedding request failed, retrying");
                return Err(backoff::Error::transient(err));
            }
            return Err(backoff::Error::permanent(err));
        }

        self.parse(&body).map_err(backoff::Error::permanent)
    }

    fn parse(&self, body: &str) -> Result<EmbeddingVector> {
        let parsed: EmbedContentResponse = serde_json::from_str(body)
            .map_err(|e| Error::MalformedResponse(format!("embedding payload: {}", e)))?;

        let values = parsed
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| Error::MalformedResponse("embedding payload has no values".into()))?;

        if values.len() != self.dimensions {
            return Err(Error::MalformedResponse(format!(
                "embedding has {} dimensions, expected {}",
                values.len(),
                self.dimensions
            )));
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let url = gemini::endpoint(&self.base_url, &self.model, "embedContent");
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_elapsed_time(Some(self.max_retry))
            .build();

        let url = url.as_str();
        let embedding = backoff::future::retry(policy, || self.embed_once(url, text)).await?;
        debug!(model = %self.model, dims = embedding.len(), "Generated embedding");
        Ok(embedding)
    }
}
