use crate::adapters::task::{self, PollSettings, TaskStatus};
use crate::error::GenerationError;
use crate::ports::generators::VideoGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

const SERVICE: &str = "yescale-veo";
const URL_KEYS: [&str; 4] = ["video_url", "url", "download_url", "output_url"];

/// Veo clips through the YesScale task API.
#[derive(Debug, Clone)]
pub struct YesScaleVideo {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pub model: String,
    pub enhance_prompt: bool,
    pub poll: PollSettings,
}

impl YesScaleVideo {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: "veo2-fast-frames".to_string(),
            enhance_prompt: true,
            poll: PollSettings::secs(5, 600),
        }
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl VideoGenerator for YesScaleVideo {
    async fn generate_video(
        &self,
        prompt: &str,
        first_frame: Option<&Path>,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey("YESCALE_VIDEO_API_KEY"))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let mut body = json!({
            "prompt": prompt,
            "model": self.model,
            "enhance_prompt": self.enhance_prompt,
            "aspect_ratio": "16:9",
        });
        if let Some(frame) = first_frame {
            let image = task::prepare_image_input(&frame.to_string_lossy()).await?;
            body["images"] = json!([image]);
        }

        let submitted = task::post_json(
            &self.client,
            SERVICE,
            &format!("{}/veo/generations", self.base_url),
            api_key,
            &body,
        )
        .await?;
        let task_id =
            task::extract_task_id(&submitted).ok_or(GenerationError::NoTaskId { service: SERVICE })?;
        tracing::info!(%task_id, "video task submitted");

        let fetch_url = format!("{}/veo/generations/{}", self.base_url, task_id);
        let started = Instant::now();
        loop {
            let fetched = task::get_json(&self.client, SERVICE, &fetch_url, api_key).await?;
            let data = match fetched.get("data") {
                Some(block @ Value::Object(_)) => block,
                _ => &fetched,
            };
            let status = task::first_str(data, &["/status"])
                .or_else(|| task::first_str(&fetched, &["/status"]))
                .unwrap_or_default();

            match TaskStatus::parse(&status) {
                TaskStatus::Succeeded => {
                    let video_url = task::find_url(data, &URL_KEYS)
                        .or_else(|| task::find_url(&fetched, &URL_KEYS))
                        .ok_or(GenerationError::NoOutput { service: SERVICE })?;
                    let dest = output_dir.join(format!(
                        "yescale_{}{}",
                        file_safe(&task_id),
                        task::resolve_suffix(&video_url, ".mp4")
                    ));
                    let saved = task::download(&self.client, SERVICE, &video_url, &dest).await?;
                    return Ok(vec![saved]);
                }
                TaskStatus::Failed => {
                    let reason = task::first_str(data, &["/message"])
                        .or_else(|| task::first_str(&fetched, &["/error"]))
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
