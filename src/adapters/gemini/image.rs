use super::client::{Content, GeminiClient, GenerateContentRequest, GenerationConfig, ImageConfig, Part};
use super::mime_extension;
use crate::error::GenerationError;
use crate::ports::generators::ImageGenerator;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const SERVICE: &str = "gemini-image";

#[derive(Debug, Clone)]
pub struct GeminiImages {
    client: GeminiClient,
    pub model: String,
    pub aspect_ratio: String,
}

impl GeminiImages {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: "gemini-2.5-flash-image".to_string(),
            aspect_ratio: "16:9".to_string(),
        }
    }
}

pub(crate) fn numbered(stem: &Path, index: usize, ext: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}{}", stem.display(), index, ext))
}

#[async_trait]
impl ImageGenerator for GeminiImages {
    async fn generate_images(
        &self,
        prompt: &str,
        reference: Option<&Path>,
        output_stem: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(reference) = reference {
            if !reference.is_file() {
                return Err(GenerationError::ImageNotFound(reference.to_path_buf()));
            }
            let part = self
                .client
                .inline_part(&reference.to_string_lossy())
                .await
                .map_err(|e| e.for_service(SERVICE))?;
            parts.push(part);
        }
        parts.push(Part::text(prompt));

        let request = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                }),
                ..GenerationConfig::default()
            }),
            ..GenerateContentRequest::default()
        };
        let response = self
            .client
            .generate_content(&self.model, &request)
            .await
            .map_err(|e| e.for_service(SERVICE))?;

        if let Some(parent) = output_stem.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut saved = Vec::new();
        for (index, blob) in response.blobs().into_iter().enumerate() {
            let bytes = blob.bytes().map_err(|e| e.for_service(SERVICE))?;
            let path = numbered(output_stem, index, &mime_extension(&blob.mime_type, ".png"));
            tokio::fs::write(&path, bytes).await?;
            tracing::info!(?path, "image saved");
            saved.push(path);
        }

        if saved.is_empty() {
            return Err(GenerationError::NoOutput { service: SERVICE });
        }
        Ok(saved)
    }
}
