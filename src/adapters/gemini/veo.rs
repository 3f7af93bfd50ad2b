use super::client::{GeminiClient, GeminiError};
use crate::error::GenerationError;
use crate::ports::generators::VideoGenerator;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const SERVICE: &str = "veo";

/// Silent clips, narration is laid over them afterwards.
pub const VEO2_MODEL: &str = "veo-2.0-generate-001";
/// Clips with their own soundtrack.
pub const VEO3_MODEL: &str = "veo-3.0-fast-generate-001";

/// Long running Veo operation as returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

impl Operation {
    fn video_uris(&self) -> Vec<String> {
        self.response
            .as_ref()
            .and_then(|r| r.pointer("/generateVideoResponse/generatedSamples"))
            .and_then(Value::as_array)
            .map(|samples| {
                samples
                    .iter()
                    .filter_map(|s| s.pointer("/video/uri").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Clips from Veo through `predictLongRunning`.
#[derive(Debug, Clone)]
pub struct VeoVideo {
    client: GeminiClient,
    pub model: String,
    pub aspect_ratio: String,
    pub duration_secs: u32,
    pub sample_count: u32,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub attempts: u32,
}

impl VeoVideo {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: VEO2_MODEL.to_string(),
            aspect_ratio: "16:9".to_string(),
            duration_secs: 8,
            sample_count: 1,
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(20 * 60),
            attempts: 3,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn instance(&self, prompt: &str, first_frame: Option<&Path>) -> Result<Value, GenerationError> {
        let mut instance = json!({ "prompt": prompt });
        if let Some(frame) = first_frame {
            let bytes = tokio::fs::read(frame).await?;
            let mime = mime_guess::from_path(frame)
                .first()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| "image/png".to_string());
            instance["image"] = json!({
                "bytesBase64Encoded": STANDARD.encode(bytes),
                "mimeType": mime,
            });
        }
        Ok(instance)
    }

    async fn attempt(
        &self,
        body: &Value,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        let mut operation: Operation = self
            .client
            .post_json(
                &format!("v1beta/models/{}:predictLongRunning", self.model),
                body,
            )
            .await
            .map_err(|e| e.for_service(SERVICE))?;
        tracing::info!(operation = %operation.name, "veo operation started");

        let started = Instant::now();
        while !operation.done {
            if started.elapsed() > self.max_wait {
                return Err(GenerationError::Timeout {
                    service: SERVICE,
                    secs: self.max_wait.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            operation = self
                .client
                .get_json(&format!("v1beta/{}", operation.name))
                .await
                .map_err(|e: GeminiError| e.for_service(SERVICE))?;
        }

        if let Some(error) = operation.error {
            return Err(GenerationError::TaskFailed {
                service: SERVICE,
                reason: error.message,
            });
        }

        let uris = operation.video_uris();
        if uris.is_empty() {
            return Err(GenerationError::NoOutput { service: SERVICE });
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let mut saved = Vec::with_capacity(uris.len());
        for (index, uri) in uris.iter().enumerate() {
            let path = output_dir.join(format!("veo_{}_{}_{}.mp4", stamp, &tag[..8], index));
            self.client
                .download(uri, &path)
                .await
                .map_err(|e| e.for_service(SERVICE))?;
            tracing::info!(?path, "veo clip saved");
            saved.push(path);
        }
        Ok(saved)
    }
}

#[async_trait]
impl VideoGenerator for VeoVideo {
    async fn generate_video(
        &self,
        prompt: &str,
        first_frame: Option<&Path>,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        if let Some(frame) = first_frame {
            if !frame.is_file() {
                return Err(GenerationError::ImageNotFound(frame.to_path_buf()));
            }
        }

        let body = json!({
            "instances": [self.instance(prompt, first_frame).await?],
            "parameters": {
                "aspectRatio": self.aspect_ratio,
                "sampleCount": self.sample_count,
                "durationSeconds": self.duration_secs,
            },
        });

        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&body, output_dir).await {
                Ok(clips) => return Ok(clips),
                Err(e) if attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "veo generation failed, retrying");
                    tokio::time::sleep(self.poll_interval).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
