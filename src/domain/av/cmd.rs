use async_trait::async_trait;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;

/// Runs the ffmpeg command line tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    async fn ffmpeg(&self, args: Vec<String>) -> io::Result<Output>;
    async fn ffprobe(&self, args: Vec<String>) -> io::Result<Output>;
    /// Whether `ffmpeg` can be spawned at all.
    async fn ffmpeg_available(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealFfmpegRunner;

#[async_trait]
impl FfmpegRunner for RealFfmpegRunner {
    async fn ffmpeg(&self, args: Vec<String>) -> io::Result<Output> {
        tracing::debug!(?args, "ffmpeg");
        TokioCommand::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn ffprobe(&self, args: Vec<String>) -> io::Result<Output> {
        TokioCommand::new("ffprobe")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn ffmpeg_available(&self) -> bool {
        TokioCommand::new("ffmpeg")
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}
