//! Configuration loaded from the environment.

use crate::domain::script::PipelineMode;
use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which backend renders scene clips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoProvider {
    /// Google Veo through the Gemini API.
    Veo,
    /// Veo through the YesScale proxy.
    YesScale,
}

/// Which backend narrates scene scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechProvider {
    Gemini,
    Fal,
}

/// Gemini API settings (script, images, speech and Veo).
#[derive(Clone, Debug)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Overrides the Veo model picked for the pipeline mode.
    pub veo_model: Option<String>,
}

/// OpenAI settings, used as a fallback script writer.
#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub script_model: String,
}

/// YesScale settings (Suno music and Veo proxy).
#[derive(Clone, Debug)]
pub struct YesScaleSettings {
    pub base_url: String,
    pub music_api_key: Option<String>,
    pub video_base_url: String,
    pub video_api_key: Option<String>,
}

/// FAL Minimax speech settings.
#[derive(Clone, Debug)]
pub struct FalSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub voice_id: String,
}

/// Pipeline behaviour.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub mode: PipelineMode,
    pub video_provider: VideoProvider,
    pub speech_provider: SpeechProvider,
    pub background_music: bool,
    pub background_volume: f32,
    pub max_concurrent: usize,
}

/// Configuration for the HTTP service and the render CLI.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: u16,
    /// Root of every generated file, served under `/static`
    pub output_dir: PathBuf,
    pub gemini: GeminiSettings,
    pub openai: OpenAiSettings,
    pub yescale: YesScaleSettings,
    pub fal: FalSettings,
    pub pipeline: PipelineSettings,
}

impl AppConfig {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_concurrent: usize = parse(&lookup, "MAX_CONCURRENT_PIPELINES", 2)?;
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_PIPELINES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let background_volume: f32 = parse(&lookup, "BACKGROUND_VOLUME", 0.5)?;
        if background_volume < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "BACKGROUND_VOLUME".to_string(),
                message: "must be >= 0".to_string(),
            });
        }

        Ok(Self {
            addr: var("ADDR", "0.0.0.0"),
            port: parse(&lookup, "PORT", 8000)?,
            output_dir: PathBuf::from(var("OUTPUT_DIR", "outputs")),
            gemini: GeminiSettings {
                api_key: secret("GEMINI_API_KEY"),
                base_url: var("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
                veo_model: secret("VEO_MODEL"),
            },
            openai: OpenAiSettings {
                api_key: secret("OPENAI_API_KEY"),
                base_url: var("OPENAI_BASE_URL", "https://api.openai.com"),
                script_model: var("OPENAI_SCRIPT_MODEL", "gpt-4.1"),
            },
            yescale: YesScaleSettings {
                base_url: var("YESCALE_BASE_URL", "https://api.yescale.io"),
                music_api_key: secret("YESCALE_MUSIC_API_KEY"),
                video_base_url: var("YESCALE_VIDEO_BASE_URL", "https://api.yescale.io"),
                video_api_key: secret("YESCALE_VIDEO_API_KEY"),
            },
            fal: FalSettings {
                api_key: secret("FAL_API_KEY"),
                base_url: var("FAL_MINIMAX_BASE_URL", "https://api.yescale.io"),
                voice_id: var("FAL_MINIMAX_VOICE_ID", "Voice904740431752642196"),
            },
            pipeline: PipelineSettings {
                mode: parse_choice(
                    &lookup,
                    "PIPELINE_MODE",
                    PipelineMode::Narrated,
                    &[
                        ("narrated", PipelineMode::Narrated),
                        ("native-audio", PipelineMode::NativeAudio),
                    ],
                )?,
                video_provider: parse_choice(
                    &lookup,
                    "VIDEO_PROVIDER",
                    VideoProvider::Veo,
                    &[("veo", VideoProvider::Veo), ("yescale", VideoProvider::YesScale)],
                )?,
                speech_provider: parse_choice(
                    &lookup,
                    "SPEECH_PROVIDER",
                    SpeechProvider::Gemini,
                    &[("gemini", SpeechProvider::Gemini), ("fal", SpeechProvider::Fal)],
                )?,
                background_music: parse(&lookup, "BACKGROUND_MUSIC", false)?,
                background_volume,
                max_concurrent,
            },
        })
    }

    /// `addr:port` for the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{:?}: {}", raw, e),
            }),
        None => Ok(default),
    }
}

fn parse_choice<F, T>(
    lookup: &F,
    key: &str,
    default: T,
    choices: &[(&str, T)],
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: Copy,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    let wanted = raw.trim().to_lowercase();
    choices
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, value)| *value)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!(
                "{:?} is not one of {}",
                raw,
                choices
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}
