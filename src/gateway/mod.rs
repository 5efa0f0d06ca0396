//! Gateway module - HTTP front end
//!
//! ```text
//! POST /chat    {messages} | [messages] | {action: "insert_review", review}
//! GET  /health
//! ```
//!
//! Chat answers stream as `text/plain`. Errors detected before the first byte
//! are JSON `{"error": ...}` with 400 or 500; errors after it abort the body.

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat::ChatService;
use crate::core::{CorpusStore, EmbeddingProvider};

pub use handlers::{AppError, ChatRequest};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub store: Arc<dyn CorpusStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/chat", post(handlers::chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
