//! Request handlers

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::core::{Conversation, Message, NewReview};
use crate::error::Error;
use crate::generation::StreamRelay;
use crate::ingest;

// ---- Error Handling ----

/// Pre-stream failure rendered as `{"error": ...}`
pub struct AppError(pub Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(stage = "request", error = %self.0, "Request failed");
        } else {
            warn!(stage = "request", error = %self.0, "Request rejected");
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

// ---- Request Parsing ----

/// Accepted `POST /chat` bodies
#[derive(Debug)]
pub enum ChatRequest {
    /// `{"messages": [...]}` or a bare array of messages
    Chat(Conversation),
    /// `{"action": "insert_review", "review": {...}}`
    InsertReview(NewReview),
}

impl ChatRequest {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidInput(format!("request body is not valid JSON: {}", e)))?;

        match value {
            Value::Array(_) => Ok(ChatRequest::Chat(parse_messages(value)?)),
            Value::Object(mut obj) => {
                if let Some(action) = obj.remove("action") {
                    return match action.as_str() {
                        Some("insert_review") => {
                            let review = obj.remove("review").ok_or_else(|| {
                                Error::InvalidInput("insert_review requires a review".into())
                            })?;
                            let review = serde_json::from_value(review)
                                .map_err(|e| Error::InvalidInput(format!("invalid review: {}", e)))?;
                            Ok(ChatRequest::InsertReview(review))
                        }
                        _ => Err(Error::InvalidInput(format!("unknown action: {}", action))),
                    };
                }

                let messages = obj
                    .remove("messages")
                    .ok_or_else(|| Error::InvalidInput("messages is required".into()))?;
                Ok(ChatRequest::Chat(parse_messages(messages)?))
            }
            _ => Err(Error::InvalidInput(
                "request body must be an object or an array of messages".into(),
            )),
        }
    }
}

fn parse_messages(value: Value) -> Result<Conversation, Error> {
    let messages: Vec<Message> = serde_json::from_value(value)
        .map_err(|e| Error::InvalidInput(format!("invalid messages: {}", e)))?;
    Ok(Conversation::new(messages))
}

// ---- Handlers ----

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "profrag-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    match ChatRequest::parse(&body)? {
        ChatRequest::Chat(conversation) => stream_answer(state, conversation).await,
        ChatRequest::InsertReview(new_review) => insert_review(state, new_review).await,
    }
}

async fn stream_answer(state: AppState, conversation: Conversation) -> Result<Response, AppError> {
    let request_id = Uuid::new_v4();
    info!(request_id = %request_id, messages = conversation.len(), "Chat request");

    let fragments = state.chat.respond(&conversation).await?;
    let body = Body::from_stream(StreamRelay::new(request_id).relay(fragments));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-request-id", request_id.to_string())
        .body(body)
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

async fn insert_review(state: AppState, new_review: NewReview) -> Result<Response, AppError> {
    let review = new_review.into_review()?;
    let stored = ingest::insert_review(
        state.store.as_ref(),
        state.embedder.as_ref(),
        review,
        true,
    )
    .await?;

    info!(
        review_id = %stored.id,
        professor = %stored.professor,
        embedded = stored.embedding.is_some(),
        "Review inserted"
    );

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "review": stored }))).into_response())
}
