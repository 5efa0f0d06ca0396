//! Prompt templates and grounding

use handlebars::Handlebars;
use serde::Serialize;

use crate::core::{Message, Prompt};
use crate::error::{Error, Result};

/// Default system instructions; `{{limit}}` is the retrieval limit
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a "Rate My Professor" assistant that helps students find professors and classes that fit their needs.

For every question you receive a context block containing up to {{limit}} student reviews that were retrieved as the most relevant to the question. Each review lists the professor, university, subject, review text, star rating and a similarity score.

Guidelines:
- Base your answer on the reviews in the context block. Mention professors by name, together with their subject and star rating.
- When several professors fit, recommend up to {{limit}} of them, best match first, and explain briefly why each one fits.
- If the context says no relevant professor information was found, say so plainly and suggest how the student could rephrase the question. Do not invent professors, ratings or reviews.
- Keep answers concise, friendly and objective."#;

const CONTEXT_START: &str = "<context>";
const CONTEXT_END: &str = "</context>";

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    name: String,
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // Prompts are plain text
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Config(format!("Invalid prompt template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Config(format!("Prompt template render error: {}", e)))
    }
}

#[derive(Serialize)]
struct SystemVars {
    limit: usize,
}

/// Assembles the generation prompt from history, context and the latest question
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    /// Render the system template once; `template` overrides the built-in one
    pub fn new(template: Option<&str>, limit: usize) -> Result<Self> {
        let template = PromptTemplate::new("system", template.unwrap_or(DEFAULT_SYSTEM_PROMPT))?;
        let system = template.render(&SystemVars { limit })?;
        Ok(PromptBuilder { system })
    }

    /// Use fixed system instructions
    pub fn with_system(system: impl Into<String>) -> Self {
        PromptBuilder {
            system: system.into(),
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Build a prompt.
    ///
    /// `history` is copied verbatim; only the latest user turn carries the
    /// context block.
    pub fn build(&self, history: &[Message], context: &str, latest: &str) -> Prompt {
        let mut turns = history.to_vec();
        turns.push(Message::user(format!(
            "{}\n{}\n{}\n\n{}",
            CONTEXT_START, context, CONTEXT_END, latest
        )));

        Prompt {
            system: self.system.clone(),
            turns,
        }
    }
}
