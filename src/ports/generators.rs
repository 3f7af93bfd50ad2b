//! Remote media generation services.

use crate::error::GenerationError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render `prompt`, optionally guided by a reference picture.
    /// Files are written as `{output_stem}_{i}{ext}`.
    async fn generate_images(
        &self,
        prompt: &str,
        reference: Option<&Path>,
        output_stem: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError>;
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate_video(
        &self,
        prompt: &str,
        first_frame: Option<&Path>,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        output_stem: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError>;
}

#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn generate_music(
        &self,
        prompt: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, GenerationError>;
}
