//! Generation module - prompting the model and relaying its answer
//!
//! - client.rs: Gemini `generateContent` / SSE streaming client
//! - prompts.rs: System template and grounded prompt assembly
//! - relay.rs: Fragment stream to HTTP body
//! - types.rs: Wire types

mod client;
mod prompts;
mod relay;
mod types;

pub use client::GeminiClient;
pub use prompts::{PromptBuilder, PromptTemplate, DEFAULT_SYSTEM_PROMPT};
pub use relay::{RelayStream, StreamRelay};
