use super::client::{
    unblocked_safety_settings, Content, GeminiClient, GenerateContentRequest, GenerationConfig,
    Part, ThinkingConfig,
};
use crate::error::LlmError;
use crate::ports::llm::{Completion, CompletionRequest, LlmProvider, TokenUsage};
use async_trait::async_trait;

/// Gemini text generation for script writing.
#[derive(Debug, Clone)]
pub struct GeminiLlm {
    client: GeminiClient,
}

impl GeminiLlm {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    async fn build_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<GenerateContentRequest, LlmError> {
        let mut parts = Vec::with_capacity(request.media.len() + 1);
        for source in &request.media {
            parts.push(self.client.inline_part(source).await?);
        }
        parts.push(Part::text(request.user.as_str()));

        let spec = &request.spec;
        let mime = if request.json {
            "application/json"
        } else {
            "text/plain"
        };

        Ok(GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(request.system.as_str())],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(spec.temperature),
                top_p: Some(spec.top_p),
                top_k: spec.top_k,
                response_mime_type: Some(mime.to_string()),
                thinking_config: (spec.thinking_budget > 0).then(|| ThinkingConfig {
                    thinking_budget: spec.thinking_budget,
                }),
                ..GenerationConfig::default()
            }),
            safety_settings: unblocked_safety_settings(),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiLlm {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let body = self.build_request(&request).await?;
        let response = self
            .client
            .generate_content(&request.spec.model, &body)
            .await?;

        let usage = response.usage_metadata.unwrap_or_default();
        let mut output_tokens = usage.candidates_token_count;
        if request.spec.thinking_budget > 0 {
            output_tokens += usage.thoughts_token_count;
        }

        Ok(Completion {
            text: response.text(),
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens,
            },
        })
    }
}
