//! AI Generator
//!
//! Produces raw text for each roadmap-building step. Output is never trusted as-is:
//! [`generate_json`] runs it through [`repair::repair_json`] and then deserializes the
//! shape the step expects.

pub mod prompts;
pub mod repair;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Skeleton,
    InfoBits,
    PhaseQuiz,
    FinalQuiz,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::Skeleton,
        PromptKind::InfoBits,
        PromptKind::PhaseQuiz,
        PromptKind::FinalQuiz,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Skeleton => "skeleton",
            PromptKind::InfoBits => "info_bits",
            PromptKind::PhaseQuiz => "phase_quiz",
            PromptKind::FinalQuiz => "final_quiz",
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, kind: PromptKind, input: &Value) -> Result<String, ApiError>;
}

/// Generate, repair and deserialize one step's output.
pub async fn generate_json<T: DeserializeOwned>(
    generator: &dyn Generator,
    kind: PromptKind,
    input: &Value,
) -> Result<T, ApiError> {
    let raw = generator.generate(kind, input).await?;
    let value = repair::repair_json(&raw)?;
    serde_json::from_value(value).map_err(|e| {
        ApiError::Validation(format!(
            "{} output has an unexpected shape: {e}",
            kind.as_str()
        ))
    })
}

/// Generator backed by a chat-completion provider.
pub struct ProviderGenerator {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl ProviderGenerator {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, kind: PromptKind, input: &Value) -> Result<String, ApiError> {
        let messages = vec![
            ChatMessage::system(prompts::template(kind)),
            ChatMessage::user(format!("INPUT = {input}")),
        ];
        let response = self.client.complete(messages, self.options.clone()).await?;
        debug!(
            kind = kind.as_str(),
            provider = self.client.provider_name(),
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Generator step finished"
        );
        Ok(response.content)
    }
}
