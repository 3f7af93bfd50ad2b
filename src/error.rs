//! Error types for edureel.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while asking a language model for a script.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("No LLM providers configured")]
    NoProviders,

    #[error("Provider {0} is not registered")]
    UnknownProvider(String),

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("All providers failed, last error: {0}")]
    AllProvidersFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by remote image, video, speech and music generators.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Missing API key: {0}")]
    MissingApiKey(&'static str),

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("{service} request failed: {reason}")]
    RequestFailed { service: &'static str, reason: String },

    #[error("{service} did not return a task id")]
    NoTaskId { service: &'static str },

    #[error("{service} task failed: {reason}")]
    TaskFailed { service: &'static str, reason: String },

    #[error("{service} task did not finish within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{service} returned no output")]
    NoOutput { service: &'static str },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while editing media with ffmpeg.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("ffmpeg was not found on PATH")]
    FfmpegNotFound,

    #[error("{tool} failed: {stderr}")]
    CommandFailed { tool: &'static str, stderr: String },

    #[error("Could not parse duration from ffprobe output: {0:?}")]
    InvalidDuration(String),

    #[error("No input videos given")]
    EmptyInput,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Could not read the last frame: {0}")]
    FrameUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the generation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Script generation failed: {0}")]
    Script(#[from] LlmError),

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Scene {index}: {source}")]
    Scene {
        index: usize,
        #[source]
        source: GenerationError,
    },

    #[error("Scene {index} produced no {what}")]
    MissingOutput { index: usize, what: &'static str },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
