use crate::error::MediaError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// How narration is laid over a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOptions {
    /// Delay applied to the audio, in seconds.
    pub audio_offset_sec: f64,
    pub volume: Option<f64>,
    /// Re-encode the video stream instead of copying it.
    pub reencode: bool,
}

/// How background music is mixed under a video's own audio.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundOptions {
    /// Gain of the background track, 1.0 is unchanged.
    pub bg_volume: f64,
    pub main_volume: Option<f64>,
    pub bg_offset_sec: f64,
    /// Loop the background so it lasts as long as the video.
    pub loop_bg: bool,
    pub reencode_video: bool,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            bg_volume: 0.5,
            main_volume: None,
            bg_offset_sec: 0.0,
            loop_bg: true,
            reencode_video: false,
        }
    }
}

#[async_trait]
pub trait VideoEditor: Send + Sync {
    /// Lay `audio` over `video`; the result ends with the shorter track.
    async fn merge_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        options: &MergeOptions,
    ) -> Result<PathBuf, MediaError>;

    async fn add_background_audio(
        &self,
        video: &Path,
        background: &Path,
        output: &Path,
        options: &BackgroundOptions,
    ) -> Result<PathBuf, MediaError>;

    /// Join `videos` in order.
    async fn concat(
        &self,
        videos: &[PathBuf],
        output: &Path,
        reencode: bool,
    ) -> Result<PathBuf, MediaError>;

    /// Save the final frame of `video` as an image.
    /// `quality` uses the ffmpeg `-q:v` scale (2 best, 31 worst).
    async fn extract_last_frame(
        &self,
        video: &Path,
        output: &Path,
        quality: Option<u32>,
    ) -> Result<PathBuf, MediaError>;
}
