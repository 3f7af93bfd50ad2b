//! Google Gemini: script writing, images, narration and Veo clips.

pub mod client;
pub mod image;
pub mod llm;
pub mod tts;
pub mod veo;

pub use client::{GeminiClient, GeminiError};
pub use image::GeminiImages;
pub use llm::GeminiLlm;
pub use tts::GeminiSpeech;
pub use veo::{VeoVideo, VEO2_MODEL, VEO3_MODEL};

use crate::error::{GenerationError, LlmError};

const PROVIDER: &str = "gemini";

/// File extension, dot included, for a blob's MIME type.
pub(crate) fn mime_extension(mime: &str, default: &str) -> String {
    let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    let preferred = match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some("wav"),
        _ => None,
    };
    preferred
        .or_else(|| mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| default.to_string())
}

impl From<GeminiError> for LlmError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Status {
                status: 401 | 403, ..
            } => LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            },
            GeminiError::Status { status: 429, .. } => LlmError::RateLimited {
                provider: PROVIDER.to_string(),
            },
            GeminiError::Status { .. } | GeminiError::Http(_) => LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: err.to_string(),
            },
            GeminiError::Decode(reason) => LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason,
            },
            GeminiError::Io(e) => LlmError::Io(e),
        }
    }
}

impl GeminiError {
    pub fn for_service(self, service: &'static str) -> GenerationError {
        match self {
            GeminiError::Http(e) => GenerationError::Http(e),
            GeminiError::Io(e) => GenerationError::Io(e),
            other => GenerationError::RequestFailed {
                service,
                reason: other.to_string(),
            },
        }
    }
}
