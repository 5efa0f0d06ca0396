//! Error types for profrag
//!
//! Soft retrieval failures are deliberately *not* represented here; see
//! [`crate::retrieval::Retrieval`]. Everything in this enum is a hard failure
//! that either aborts a request or terminates a response stream.

use thiserror::Error;

/// Result type alias using profrag's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for profrag
#[derive(Error, Debug)]
pub enum Error {
    /// A required credential or setting is absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Configuration is present but invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding or generation service unreachable or returned a failure status
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        /// Which upstream failed ("embedding", "generation")
        service: &'static str,
        /// Cause as reported by the transport or the service
        message: String,
    },

    /// Upstream answered with an unexpected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Duplicate or invalid insert into the corpus
    #[error("Storage constraint violation: {0}")]
    StorageConstraintViolation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an embedding-service outage
    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            service: "embedding",
            message: message.into(),
        }
    }

    /// Shorthand for a generation-service outage
    pub fn generation_unavailable(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            service: "generation",
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. } | Error::Http(_) | Error::Database(_)
        )
    }

    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::NotFound(_) | Error::StorageConstraintViolation(_)
        )
    }

    /// HTTP status the gateway reports for this error
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}
