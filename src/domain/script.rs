//! Scene scripts written by the language model.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How scene clips get their sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// Silent clips (Veo 2) narrated with text-to-speech, chained by last frame.
    Narrated,
    /// Clips generated with dialogue and sound (Veo 3), no narration step.
    NativeAudio,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    /// Narration in the video language.
    #[serde(default)]
    pub script: String,
    /// English description of the first frame.
    pub prompt_image: String,
    /// English description of the motion.
    pub prompt_video: String,
    /// Short learning takeaway, shown as a subtitle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    #[serde(rename = "scence_script", alias = "scene_script")]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub music_prompt: String,
}

impl Script {
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        let script: Script = serde_json::from_value(value)
            .map_err(|e| PipelineError::InvalidScript(e.to_string()))?;
        if script.scenes.is_empty() {
            return Err(PipelineError::InvalidScript(
                "the script has no scenes".to_string(),
            ));
        }
        Ok(script)
    }

    /// Check that every scene carries what `mode` needs to render it.
    pub fn validate(&self, mode: PipelineMode) -> Result<(), PipelineError> {
        for (index, scene) in self.scenes.iter().enumerate() {
            if scene.prompt_video.trim().is_empty() {
                return Err(PipelineError::InvalidScript(format!(
                    "scene {} has no prompt_video",
                    index
                )));
            }
            if mode == PipelineMode::Narrated && scene.script.trim().is_empty() {
                return Err(PipelineError::InvalidScript(format!(
                    "scene {} has no narration",
                    index
                )));
            }
        }
        Ok(())
    }
}

/// Instructions for the script writer.
pub fn system_prompt(mode: PipelineMode) -> &'static str {
    match mode {
        PipelineMode::Narrated => NARRATED_PROMPT,
        PipelineMode::NativeAudio => NATIVE_AUDIO_PROMPT,
    }
}

/// The per-request part of the conversation.
pub fn user_prompt(summary: &str, language: &str) -> String {
    format!(
        "Story outline: {}\nVideo language: {}\n",
        summary.trim(),
        language.trim()
    )
}

const NARRATED_PROMPT: &str = r#"You write scripts for educational videos for young children.

You receive:
1) An outline of the story
2) The language of the video
3) A picture of the main character (reference image). Always use it to keep the character consistent.

# Content
- The whole "script" field must be written in the requested language.
- Keep it short, simple and suitable for children; avoid abstract or sensitive topics.
- Open with an introduction and close with a goodbye.
- Every scene lasts 8 seconds; the narration must fit 8 seconds, no longer and no shorter.
- The main character appears in every scene and always matches the reference image.
- Avoid text or signs in the frame; no text overlays.
- Do not describe the main character in detail; say just enough to keep it consistent with the reference.
- No brands, copyrighted characters, violence, adult or frightening content.

# Visuals and motion
- prompt_image: the first frame of the scene, in English, clear, no dialogue.
- prompt_video: the motion of the scene, in English, no dialogue or sound; present continuous tense, one or two smooth actions, simple camera (slight pan, slow zoom), bright lighting and cheerful colours.
- 16:9 frame, cute cartoon style for children.

# Subtitle
- main_content: one short sentence (at most 80 characters) with the key learning point of the scene; no emoji, no quotes.

# Output
Return plain JSON only (no markdown, no commentary) with this schema:
{
  "scence_script": [
    {
      "script": "Narration in the video language, about 8 seconds",
      "prompt_image": "English. First frame. No dialogue.",
      "prompt_video": "English. Motion, camera, lighting for 8 seconds. No dialogue.",
      "main_content": "Short learning point"
    }
  ],
  "music_prompt": "English. Mood, tempo (BPM), key, instruments and structure for the whole video; cheerful, kid-friendly; no vocals."
}
"#;

const NATIVE_AUDIO_PROMPT: &str = r#"You write scripts for educational videos for young children.

You receive:
1) An outline of the story
2) The language of the video
3) A picture of the main character

# Notes
- The main character must always appear in the video.
- Keep text on screen to a minimum.
- Do not describe the main character in detail.
- Visual prompts are written in English; only the spoken lines stay in the video language.
- Every scene lasts 8 seconds, so the spoken lines must fit that length.
- Open with an introduction and close with a goodbye.

Output format must be JSON:
{
  "scence_script": [
    {
      "prompt_image": "Detailed description of the first frame of the scene",
      "prompt_video": "Detailed prompt for the scene video, including the spoken lines and the sound of the scene"
    }
  ],
  "music_prompt": "Detailed prompt for the song of the video"
}
"#;
