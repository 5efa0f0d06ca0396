//! Google Generative Language API plumbing shared by the embedding and
//! generation clients: authenticated HTTP client, wire types, error mapping.

use reqwest::{header, Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GoogleConfig;
use crate::error::{Error, Result};

/// Build the shared HTTP client with the API key as a default header.
///
/// No overall timeout is set on the client because it would also cut long
/// streaming responses; single-shot requests set one per request.
pub(crate) fn http_client(config: &GoogleConfig) -> Result<Client> {
    let api_key = config.api_key.expose_secret();
    if api_key.is_empty() {
        return Err(Error::ConfigurationMissing(
            "GOOGLE_API_KEY is required".to_string(),
        ));
    }

    let mut headers = header::HeaderMap::new();
    let mut key = header::HeaderValue::from_str(api_key)
        .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?;
    key.set_sensitive(true);
    headers.insert("x-goog-api-key", key);

    let client = Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    Ok(client)
}

/// `{base_url}/models/{model}:{method}`
pub(crate) fn endpoint(base_url: &str, model: &str, method: &str) -> String {
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{}/models/{}:{}", base_url.trim_end_matches('/'), model, method)
}

/// Map a non-success response to `UpstreamUnavailable`, keeping the API's own message
pub(crate) fn status_error(service: &'static str, status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());

    Error::UpstreamUnavailable {
        service,
        message: format!("API error ({}): {}", status, message),
    }
}

/// A content block (one conversation turn)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Content {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    /// Concatenated text of all parts
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

/// A content part; only text parts are used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Error payload returned by the API, both as a response body and inside SSE frames
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}
