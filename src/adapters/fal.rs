//! Minimax narration through the FAL speech task API.

use crate::adapters::task::{self, PollSettings, TaskStatus};
use crate::error::GenerationError;
use crate::ports::generators::SpeechSynthesizer;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

const SERVICE: &str = "fal-minimax";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceSetting {
    pub speed: f32,
    pub vol: f32,
    pub pitch: f32,
    pub english_normalization: bool,
    pub voice_id: String,
}

#[derive(Debug, Clone)]
pub struct FalSpeech {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pub voice: VoiceSetting,
    pub language_boost: String,
    pub poll: PollSettings,
}

impl FalSpeech {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            voice: VoiceSetting {
                speed: 1.0,
                vol: 1.0,
                pitch: 0.0,
                english_normalization: false,
                voice_id: voice_id.into(),
            },
            language_boost: "auto".to_string(),
            poll: PollSettings::secs(2, 180),
        }
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

fn audio_url(payload: &Value) -> Option<String> {
    let keys = ["audio_url"];
    payload
        .get("response")
        .and_then(|v| task::find_url(v, &keys))
        .or_else(|| payload.get("result").and_then(|v| task::find_url(v, &keys)))
        .or_else(|| task::find_url(payload, &keys))
}

#[async_trait]
impl SpeechSynthesizer for FalSpeech {
    async fn synthesize(
        &self,
        text: &str,
        output_stem: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey("FAL_API_KEY"))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let body = json!({
            "text": text,
            "voice_setting": self.voice,
            "language_boost": self.language_boost,
            "output_format": "url",
        });
        let submitted = task::post_json(
            &self.client,
            SERVICE,
            &format!("{}/fal-ai/minimax/speech-02-hd", self.base_url),
            api_key,
            &body,
        )
        .await?;
        let task_id =
            task::extract_task_id(&submitted).ok_or(GenerationError::NoTaskId { service: SERVICE })?;

        let poll_url = format!("{}/task/{}", self.base_url, task_id);
        let started = Instant::now();
        loop {
            let polled = task::get_json(&self.client, SERVICE, &poll_url, api_key).await?;
            let status =
                task::first_str(&polled, &["/status", "/task_status", "/state", "/task/status"])
                    .unwrap_or_default();

            match TaskStatus::parse(&status) {
                TaskStatus::Succeeded => {
                    let url = audio_url(&polled).ok_or(GenerationError::NoOutput { service: SERVICE })?;
                    let dest = if output_stem.extension().is_some() {
                        output_stem.to_path_buf()
                    } else {
                        PathBuf::from(format!(
                            "{}{}",
                            output_stem.display(),
                            task::resolve_suffix(&url, ".mp3")
                        ))
                    };
                    let saved = task::download(&self.client, SERVICE, &url, &dest).await?;
                    return Ok(vec![saved]);
                }
                TaskStatus::Failed => {
                    let reason = task::first_str(&polled, &["/error", "/message", "/response/error"])
                        .unwrap_or_else(|| "unknown reason".to_string());
                    return Err(GenerationError::TaskFailed {
                        service: SERVICE,
                        reason,
                    });
                }
                TaskStatus::Pending => {}
            }

            if started.elapsed() > self.poll.timeout {
                return Err(GenerationError::Timeout {
                    service: SERVICE,
                    secs: self.poll.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}
