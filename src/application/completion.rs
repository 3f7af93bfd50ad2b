//! Script writing over an ordered list of language model providers.

use crate::domain::json_repair::parse_model_json;
use crate::domain::script::{system_prompt, user_prompt, PipelineMode, Script};
use crate::error::{LlmError, PipelineError};
use crate::ports::llm::{CompletionRequest, LlmProvider, ProviderSpec, TokenUsage};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A provider and the settings it is called with.
#[derive(Clone)]
pub struct ProviderEntry {
    pub spec: ProviderSpec,
    pub provider: Arc<dyn LlmProvider>,
}

impl ProviderEntry {
    pub fn new(provider: Arc<dyn LlmProvider>, spec: ProviderSpec) -> Self {
        Self { spec, provider }
    }
}

/// Settings for the primary script writer.
pub fn gemini_script_spec() -> ProviderSpec {
    ProviderSpec {
        model: "gemini-2.5-pro".to_string(),
        retry: 3,
        temperature: 1.5,
        top_p: 0.95,
        top_k: Some(40),
        thinking_budget: 10000,
    }
}

pub fn openai_script_spec(model: &str) -> ProviderSpec {
    ProviderSpec {
        retry: 1,
        ..ProviderSpec::new(model)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub json: bool,
    /// Accept an empty answer instead of failing over.
    pub can_empty: bool,
    pub media: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionOutput {
    pub text: String,
    /// Parsed document, when JSON was requested and the answer was not empty.
    pub json: Option<Value>,
    pub usage: TokenUsage,
    pub model: String,
}

impl CompletionOutput {
    /// Workflow step recorded for this answer.
    pub fn step(&self) -> String {
        format!("generate_with_{}", self.model)
    }
}

/// Replace chat control tokens with plain words.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .replace("<|endofprompt|>", "endofprompt")
        .replace("<|endoftext|>", "endoftext")
}

pub struct ScriptWriter {
    providers: Vec<ProviderEntry>,
    retry_delay: Duration,
}

impl ScriptWriter {
    pub fn new(providers: Vec<ProviderEntry>) -> Self {
        Self {
            providers,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Ask each provider in turn; the first acceptable answer wins.
    pub async fn completion(
        &self,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionOutput, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        let user = sanitize_prompt(user);
        let mut last_error: Option<LlmError> = None;

        for entry in &self.providers {
            let name = entry.provider.name().to_string();
            for attempt in 0..=entry.spec.retry {
                if attempt > 0 {
                    tokio::time::sleep(self.retry_delay).await;
                }
                let request = CompletionRequest {
                    system: system.to_string(),
                    user: user.clone(),
                    json: options.json,
                    media: options.media.clone(),
                    spec: entry.spec.clone(),
                };
                match self.try_once(entry, request, options).await {
                    Ok(output) => {
                        tracing::info!(
                            provider = %name,
                            model = %output.model,
                            input_tokens = output.usage.input_tokens,
                            output_tokens = output.usage.output_tokens,
                            "completion succeeded"
                        );
                        return Ok(output);
                    }
                    Err(e) => {
                        tracing::warn!(provider = %name, attempt, error = %e, "completion failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(LlmError::AllProvidersFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    async fn try_once(
        &self,
        entry: &ProviderEntry,
        request: CompletionRequest,
        options: &CompletionOptions,
    ) -> Result<CompletionOutput, LlmError> {
        let completion = entry.provider.complete(request).await?;
        let text = completion.text.trim().to_string();

        if text.is_empty() && !options.can_empty {
            return Err(LlmError::EmptyResponse {
                provider: entry.provider.name().to_string(),
            });
        }
        let json = if options.json && !text.is_empty() {
            Some(parse_model_json(&text)?)
        } else {
            None
        };

        Ok(CompletionOutput {
            text,
            json,
            usage: completion.usage,
            model: entry.spec.model.clone(),
        })
    }

    /// Write and validate the scene script for one video.
    pub async fn write_script(
        &self,
        summary: &str,
        language: &str,
        mode: PipelineMode,
        reference: Option<&Path>,
    ) -> Result<(Script, CompletionOutput), PipelineError> {
        let options = CompletionOptions {
            json: true,
            can_empty: false,
            media: reference
                .map(|p| vec![p.to_string_lossy().into_owned()])
                .unwrap_or_default(),
        };
        let output = self
            .completion(system_prompt(mode), &user_prompt(summary, language), &options)
            .await?;
        let value = output
            .json
            .clone()
            .ok_or_else(|| PipelineError::InvalidScript("empty script".to_string()))?;
        let script = Script::from_value(value)?;
        script.validate(mode)?;
        Ok((script, output))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::llm::Completion;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider answering from a fixed queue, then failing.
    pub struct QueuedProvider {
        pub name: &'static str,
        pub answers: Mutex<VecDeque<Result<String, String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl QueuedProvider {
        pub fn new(name: &'static str, answers: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .map(|a| a.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for QueuedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
            self.requests.lock().unwrap().push(request);
            let next = self.answers.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(Completion {
                    text,
                    usage: TokenUsage {
                        input_tokens: 1,
                        output_tokens: 2,
                    },
                }),
                Some(Err(reason)) => Err(LlmError::RequestFailed {
                    provider: self.name.to_string(),
                    reason,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: self.name.to_string(),
                    reason: "no more answers".to_string(),
                }),
            }
        }
    }

    fn writer(entries: Vec<ProviderEntry>) -> ScriptWriter {
        ScriptWriter::new(entries).with_retry_delay(Duration::ZERO)
    }

    fn spec(model: &str, retry: u32) -> ProviderSpec {
        ProviderSpec {
            retry,
            ..ProviderSpec::new(model)
        }
    }

    #[test]
    fn control_tokens_are_defused() {
        assert_eq!(
            sanitize_prompt("a<|endofprompt|>b<|endoftext|>"),
            "aendofpromptbendoftext"
        );
    }

    #[tokio::test]
    async fn empty_provider_list_is_an_error() {
        let err = writer(vec![])
            .completion("s", "u", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NoProviders));
    }

    #[tokio::test]
    async fn retries_then_fails_over() {
        let primary = QueuedProvider::new("gemini", vec![Err("boom"), Ok("   ")]);
        let backup = QueuedProvider::new("openai", vec![Ok("{\"a\": \"x\",}")]);
        let writer = writer(vec![
            ProviderEntry::new(primary.clone(), spec("gemini-2.5-pro", 1)),
            ProviderEntry::new(backup.clone(), spec("gpt-4.1", 0)),
        ]);

        let output = writer
            .completion(
                "s",
                "story <|endoftext|>",
                &CompletionOptions {
                    json: true,
                    ..CompletionOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(output.json, Some(serde_json::json!({"a": "x"})));
        assert_eq!(output.step(), "generate_with_gpt-4.1");
        assert_eq!(primary.requests.lock().unwrap().len(), 2);
        assert_eq!(backup.requests.lock().unwrap()[0].user, "story endoftext");
    }

    #[tokio::test]
    async fn empty_answer_allowed_when_requested() {
        let provider = QueuedProvider::new("gemini", vec![Ok("")]);
        let output = writer(vec![ProviderEntry::new(provider, spec("m", 0))])
            .completion(
                "s",
                "u",
                &CompletionOptions {
                    can_empty: true,
                    ..CompletionOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(output.text, "");
        assert!(output.json.is_none());
    }

    #[tokio::test]
    async fn all_failures_report_last_error() {
        let provider = QueuedProvider::new("gemini", vec![Err("first"), Err("second")]);
        let err = writer(vec![ProviderEntry::new(provider, spec("m", 1))])
            .completion("s", "u", &CompletionOptions::default())
            .await
            .unwrap_err();
        match err {
            LlmError::AllProvidersFailed(reason) => assert!(reason.contains("second")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn script_is_parsed_and_validated() {
        let answer = r#"```json
{"scence_script": [
  {"script": "Hello!", "prompt_image": "a fox", "prompt_video": "the fox waves"}
], "music_prompt": "happy ukulele"}
```"#;
        let provider = QueuedProvider::new("gemini", vec![Ok(answer)]);
        let (script, output) = writer(vec![ProviderEntry::new(
            provider.clone(),
            gemini_script_spec(),
        )])
        .write_script("letters", "English", PipelineMode::Narrated, Some(Path::new("hero.png")))
        .await
        .unwrap();
        assert_eq!(script.scenes.len(), 1);
        assert_eq!(script.music_prompt, "happy ukulele");
        assert_eq!(output.step(), "generate_with_gemini-2.5-pro");

        let request = &provider.requests.lock().unwrap()[0];
        assert!(request.json);
        assert_eq!(request.media, vec!["hero.png".to_string()]);
        assert_eq!(request.spec.thinking_budget, 10000);
    }

    #[tokio::test]
    async fn narrated_script_needs_narration() {
        let answer = r#"{"scence_script": [{"prompt_image": "a", "prompt_video": "b"}]}"#;
        let provider = QueuedProvider::new("gemini", vec![Ok(answer)]);
        let err = writer(vec![ProviderEntry::new(provider, spec("m", 0))])
            .write_script("s", "l", PipelineMode::Narrated, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidScript(_)));
    }
}
