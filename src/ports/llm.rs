use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model choice and sampling values for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub model: String,
    /// Extra attempts after the first failure.
    pub retry: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
    /// Reasoning token budget, 0 disables thinking.
    pub thinking_budget: u32,
}

impl ProviderSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            retry: 0,
            temperature: 1.0,
            top_p: 0.95,
            top_k: None,
            thinking_budget: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Ask for a JSON document instead of free text.
    pub json: bool,
    /// Local paths or `http(s)` URLs of images sent with the prompt.
    pub media: Vec<String>,
    pub spec: ProviderSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}
