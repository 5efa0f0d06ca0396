//! Core types used across the application
//!
//! Reviews and matches are shared by storage, retrieval and ingestion;
//! messages and conversations by the chat pipeline and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Fixed-length embedding vector
pub type EmbeddingVector = Vec<f32>;

/// A student review of a professor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique review ID
    pub id: Uuid,
    /// Professor name
    pub professor: String,
    /// University the professor teaches at
    pub university: String,
    /// Course subject
    pub subject: String,
    /// Review body
    pub text: String,
    /// Star rating (1-5)
    pub stars: i32,
    /// Embedding; `None` until the backfill has run
    #[serde(skip)]
    pub embedding: Option<EmbeddingVector>,
    /// When the review was ingested
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Create a new review without an embedding
    pub fn new(
        professor: impl Into<String>,
        university: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        stars: i32,
    ) -> Self {
        Review {
            id: Uuid::new_v4(),
            professor: professor.into(),
            university: university.into(),
            subject: subject.into(),
            text: text.into(),
            stars,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Set the ID
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Text fed to the embedding model at ingestion time
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.professor, self.university, self.subject, self.text
        )
    }

    /// Reject reviews that would be useless as retrieval context
    pub fn validate(&self) -> Result<()> {
        if self.professor.trim().is_empty() {
            return Err(Error::InvalidInput("review.professor must not be empty".into()));
        }
        if self.text.trim().is_empty() {
            return Err(Error::InvalidInput("review.text must not be empty".into()));
        }
        if !(1..=5).contains(&self.stars) {
            return Err(Error::InvalidInput(format!(
                "review.stars must be between 1 and 5, got {}",
                self.stars
            )));
        }
        Ok(())
    }

    /// Copy of this review without its embedding, as carried by a [`Match`]
    pub fn snapshot(&self) -> Self {
        Review {
            embedding: None,
            ..self.clone()
        }
    }
}

/// A review as submitted by a caller or read from a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    /// Optional caller-chosen ID
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Professor name
    pub professor: String,
    /// University
    #[serde(default)]
    pub university: String,
    /// Course subject
    #[serde(default)]
    pub subject: String,
    /// Review body
    #[serde(alias = "review")]
    pub text: String,
    /// Star rating
    pub stars: i32,
}

impl NewReview {
    /// Turn into a validated [`Review`]
    pub fn into_review(self) -> Result<Review> {
        let mut review = Review::new(
            self.professor,
            self.university,
            self.subject,
            self.text,
            self.stars,
        );
        if let Some(id) = self.id {
            review = review.with_id(id);
        }
        review.validate()?;
        Ok(review)
    }
}

/// A review that cleared the similarity threshold for a query
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    /// ID of the matched review
    pub review_id: Uuid,
    /// Similarity score (0.0 - 1.0, higher is more similar)
    pub score: f32,
    /// Review fields at query time
    pub review: Review,
}

impl Match {
    /// Build a match, clamping the score into [0, 1]
    pub fn new(review: &Review, score: f32) -> Self {
        Match {
            review_id: review.id,
            score: score.clamp(0.0, 1.0),
            review: review.snapshot(),
        }
    }
}

/// Corpus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    /// All reviews
    pub total: i64,
    /// Reviews that have an embedding
    pub embedded: i64,
}

impl CorpusStats {
    /// Reviews still waiting for the backfill
    pub fn pending(&self) -> i64 {
        self.total - self.embedded
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered messages supplied whole by the caller for a single request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Wrap an ordered list of messages
    pub fn new(messages: Vec<Message>) -> Self {
        Conversation { messages }
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message being answered
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Every message before the latest one
    pub fn history(&self) -> &[Message] {
        match self.messages.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Check the conversation can be answered: non-empty and ending in a user turn
    pub fn validate(&self) -> Result<&Message> {
        let latest = self
            .latest()
            .ok_or_else(|| Error::InvalidInput("messages must not be empty".into()))?;

        if latest.role != Role::User {
            return Err(Error::InvalidInput(format!(
                "the last entry in messages must have role \"user\", got \"{}\"",
                latest.role
            )));
        }
        if latest.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "the last entry in messages has empty content".into(),
            ));
        }

        Ok(latest)
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Conversation::new(messages)
    }
}
