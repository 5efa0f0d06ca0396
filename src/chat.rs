//! Chat pipeline: validate, retrieve, assemble, build, generate
//!
//! Each request runs the stages in sequence. Retrieval failures only remove
//! the grounding; validation and generation failures end the request.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::{
    Conversation, CorpusStore, EmbeddingProvider, GenerationProvider, GenerationStream, Prompt,
    DEFAULT_LIMIT,
};
use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::retrieval::{ContextAssembler, Retrieval, Retriever};

/// Answers conversations using retrieved reviews as context
#[derive(Clone)]
pub struct ChatService {
    retriever: Retriever,
    assembler: ContextAssembler,
    prompts: PromptBuilder,
    generator: Arc<dyn GenerationProvider>,
    limit: usize,
}

impl ChatService {
    pub fn new(
        retriever: Retriever,
        prompts: PromptBuilder,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        ChatService {
            retriever,
            assembler: ContextAssembler::default(),
            prompts,
            generator,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Wire the pipeline from configuration
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        let retrieval = &config.retrieval;
        let retriever = Retriever::new(store, embedder).with_threshold(retrieval.threshold);
        let prompts =
            PromptBuilder::new(config.generation.system_prompt.as_deref(), retrieval.limit)?;

        Ok(ChatService::new(retriever, prompts, generator)
            .with_limit(retrieval.limit)
            .with_assembler(ContextAssembler::new(retrieval.max_review_chars)))
    }

    /// Maximum matches per request
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Build the grounded prompt for the latest message
    pub async fn prepare(&self, conversation: &Conversation) -> Result<Prompt> {
        let latest = conversation.validate()?;

        let retrieval = self.retriever.retrieve(&latest.content, self.limit).await;
        match &retrieval {
            Retrieval::Matches(matches) => {
                info!(matches = matches.len(), "Retrieved context");
            }
            Retrieval::Degraded { stage, cause } => {
                warn!(stage = %stage, error = %cause, "Answering without retrieved context");
            }
        }

        let context = self.assembler.assemble(retrieval.matches());
        let prompt = self
            .prompts
            .build(conversation.history(), &context, &latest.content);

        debug!(
            turns = prompt.turns.len(),
            context_chars = context.len(),
            "Prompt built"
        );
        Ok(prompt)
    }

    /// Streamed answer
    pub async fn respond(&self, conversation: &Conversation) -> Result<GenerationStream> {
        let prompt = self.prepare(conversation).await?;
        self.generator.stream(&prompt).await
    }

    /// Whole answer
    pub async fn answer(&self, conversation: &Conversation) -> Result<String> {
        let prompt = self.prepare(conversation).await?;
        self.generator.complete(&prompt).await
    }
}
