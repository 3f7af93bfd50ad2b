use super::client::{
    Content, GeminiClient, GenerateContentRequest, GenerationConfig, Part,
    SpeechConfig,
};
use super::image::numbered;
use super::mime_extension;
use crate::domain::wav::{is_raw_pcm, pcm_to_wav};
use crate::error::GenerationError;
use crate::ports::generators::SpeechSynthesizer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SERVICE: &str = "gemini-tts";

/// Narration with a Gemini prebuilt voice.
#[derive(Debug, Clone)]
pub struct GeminiSpeech {
    client: GeminiClient,
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    pub attempts: u32,
    /// First retry delay, doubled after every failure.
    pub backoff: Duration,
}

impl GeminiSpeech {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: "gemini-2.5-pro-preview-tts".to_string(),
            voice: "Zephyr".to_string(),
            temperature: 1.0,
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }

    async fn request_audio(&self, text: &str, output_stem: &Path) -> Result<Vec<PathBuf>, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(text)])],
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::voice(self.voice.as_str())),
                ..GenerationConfig::default()
            }),
            ..GenerateContentRequest::default()
        };
        let response = self
            .client
            .generate_content(&self.model, &request)
            .await
            .map_err(|e| e.for_service(SERVICE))?;

        let blobs = response.blobs();
        if blobs.is_empty() {
            return Err(GenerationError::NoOutput { service: SERVICE });
        }
        if let Some(parent) = output_stem.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut saved = Vec::with_capacity(blobs.len());
        for (index, blob) in blobs.into_iter().enumerate() {
            let bytes = blob.bytes().map_err(|e| e.for_service(SERVICE))?;
            let (data, ext) = if is_raw_pcm(&blob.mime_type) {
                (pcm_to_wav(&bytes, &blob.mime_type)?, ".wav".to_string())
            } else {
                (bytes, mime_extension(&blob.mime_type, ".wav"))
            };
            let path = numbered(output_stem, index, &ext);
            tokio::fs::write(&path, data).await?;
            saved.push(path);
        }
        Ok(saved)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeech {
    async fn synthesize(
        &self,
        text: &str,
        output_stem: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match self.request_audio(text, output_stem).await {
                Ok(files) => return Ok(files),
                Err(e) if attempt < self.attempts.max(1) => {
                    tracing::warn!(attempt, error = %e, "speech synthesis failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
