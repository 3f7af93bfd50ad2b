//! One video from summary to final file.

use crate::application::completion::ScriptWriter;
use crate::domain::jobs::PipelineEvent;
use crate::domain::layout::OutputLayout;
use crate::domain::script::{PipelineMode, Scene, Script};
use crate::error::{GenerationError, PipelineError};
use crate::ports::editor::{BackgroundOptions, MergeOptions, VideoEditor};
use crate::ports::events::EventPublisher;
use crate::ports::generators::{ImageGenerator, MusicGenerator, SpeechSynthesizer, VideoGenerator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appended to visual prompts rendered from a reference picture.
pub const REFERENCE_SUFFIX: &str = ", Use image reference ";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub run_id: String,
    pub summary: String,
    pub language: String,
    pub reference_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub run_id: String,
    pub video_path: PathBuf,
    pub video_url: Option<String>,
    pub script_path: PathBuf,
    pub clips: Vec<PathBuf>,
    pub workflow: Vec<String>,
}

/// Services a pipeline run talks to.
pub struct PipelineServices {
    pub writer: ScriptWriter,
    pub images: Arc<dyn ImageGenerator>,
    pub videos: Arc<dyn VideoGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub editor: Arc<dyn VideoEditor>,
    pub music: Option<Arc<dyn MusicGenerator>>,
    pub events: Arc<dyn EventPublisher>,
}

pub struct Pipeline {
    layout: OutputLayout,
    mode: PipelineMode,
    background_volume: f64,
    services: PipelineServices,
}

fn first_output(
    index: usize,
    what: &'static str,
    result: Result<Vec<PathBuf>, GenerationError>,
) -> Result<PathBuf, PipelineError> {
    result
        .map_err(|source| PipelineError::Scene { index, source })?
        .into_iter()
        .next()
        .ok_or(PipelineError::MissingOutput { index, what })
}

fn with_suffix(prompt: &str, apply: bool) -> String {
    if apply {
        format!("{}{}", prompt, REFERENCE_SUFFIX)
    } else {
        prompt.to_string()
    }
}

/// `clip.mp4` becomes `clip_audio.mp4` next to it.
fn narrated_path(clip: &Path) -> PathBuf {
    let stem = clip
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    clip.with_file_name(format!("{}_audio.mp4", stem))
}

impl Pipeline {
    pub fn new(
        layout: OutputLayout,
        mode: PipelineMode,
        background_volume: f64,
        services: PipelineServices,
    ) -> Self {
        Self {
            layout,
            mode,
            background_volume,
            services,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Run every stage and report the outcome as events.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationOutput, PipelineError> {
        let events = &self.services.events;
        events.publish(PipelineEvent::Started {
            job_id: request.run_id.clone(),
        });
        tracing::info!(run_id = %request.run_id, mode = ?self.mode, "pipeline started");

        let result = self.render(&request).await;
        match &result {
            Ok(output) => {
                tracing::info!(run_id = %request.run_id, video = ?output.video_path, "pipeline finished");
                events.publish(PipelineEvent::Finished {
                    job_id: request.run_id.clone(),
                    video_path: output.video_path.clone(),
                    video_url: output.video_url.clone(),
                });
            }
            Err(e) => {
                tracing::error!(run_id = %request.run_id, error = %e, "pipeline failed");
                events.publish(PipelineEvent::Failed {
                    job_id: request.run_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    async fn render(&self, request: &GenerationRequest) -> Result<GenerationOutput, PipelineError> {
        let run_id = request.run_id.as_str();
        let reference = request.reference_image.as_deref();
        let mut workflow = Vec::new();

        let (script, completion) = self
            .services
            .writer
            .write_script(&request.summary, &request.language, self.mode, reference)
            .await?;
        workflow.push(completion.step());

        let script_path = self.layout.script_path(run_id);
        if let Some(parent) = script_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = completion.json.clone().unwrap_or_default();
        tokio::fs::write(&script_path, serde_json::to_vec_pretty(&raw)?).await?;

        self.services.events.publish(PipelineEvent::ScriptReady {
            job_id: run_id.to_string(),
            scenes: script.scenes.len(),
        });

        let clips = match self.mode {
            PipelineMode::Narrated => self.render_narrated(run_id, &script, reference).await?,
            PipelineMode::NativeAudio => self.render_native(run_id, &script, reference).await?,
        };

        let mut video_path = self.layout.final_video_path(run_id);
        self.services
            .editor
            .concat(&clips, &video_path, true)
            .await?;
        workflow.push("concat_videos".to_string());

        if let Some(mixed) = self.add_music(run_id, &script, &video_path).await {
            video_path = mixed;
            workflow.push("add_background_music".to_string());
        }

        if !tokio::fs::try_exists(&video_path).await.unwrap_or(false) {
            return Err(PipelineError::MissingOutput {
                index: clips.len(),
                what: "final video",
            });
        }

        Ok(GenerationOutput {
            run_id: run_id.to_string(),
            video_url: self.layout.static_url(&video_path),
            video_path,
            script_path,
            clips,
            workflow,
        })
    }

    async fn scene_image(
        &self,
        run_id: &str,
        index: usize,
        scene: &Scene,
        reference: Option<&Path>,
    ) -> Result<PathBuf, PipelineError> {
        let prompt = with_suffix(&scene.prompt_image, reference.is_some());
        let stem = self.layout.images().join(format!("{}_scene_{}", run_id, index));
        first_output(
            index,
            "image",
            self.services
                .images
                .generate_images(&prompt, reference, &stem)
                .await,
        )
    }

    async fn scene_clip(
        &self,
        index: usize,
        scene: &Scene,
        first_frame: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let prompt = with_suffix(&scene.prompt_video, true);
        first_output(
            index,
            "video",
            self.services
                .videos
                .generate_video(&prompt, Some(first_frame), &self.layout.videos())
                .await,
        )
    }

    async fn render_narrated(
        &self,
        run_id: &str,
        script: &Script,
        reference: Option<&Path>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut clips = Vec::with_capacity(script.scenes.len());
        let mut last_frame: Option<PathBuf> = None;

        for (index, scene) in script.scenes.iter().enumerate() {
            let image = self.scene_image(run_id, index, scene, reference).await?;

            let audio_stem = self.layout.audio().join(format!("{}_scene_{}", run_id, index));
            let audio = first_output(
                index,
                "audio",
                self.services.speech.synthesize(&scene.script, &audio_stem).await,
            )?;

            let first_frame = match (index, &last_frame) {
                (0, _) | (_, None) => image.clone(),
                (_, Some(frame)) => frame.clone(),
            };
            let clip = self.scene_clip(index, scene, &first_frame).await?;

            let narrated = narrated_path(&clip);
            self.services
                .editor
                .merge_audio(&clip, &audio, &narrated, &MergeOptions::default())
                .await?;

            let frame = self
                .services
                .editor
                .extract_last_frame(&narrated, &self.layout.last_frame_path(run_id), None)
                .await?;
            last_frame = Some(frame);

            self.services.events.publish(PipelineEvent::SceneRendered {
                job_id: run_id.to_string(),
                index,
                clip: narrated.clone(),
            });
            clips.push(narrated);
        }
        Ok(clips)
    }

    async fn render_native(
        &self,
        run_id: &str,
        script: &Script,
        reference: Option<&Path>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut clips = Vec::with_capacity(script.scenes.len());
        for (index, scene) in script.scenes.iter().enumerate() {
            let image = self.scene_image(run_id, index, scene, reference).await?;
            let clip = self.scene_clip(index, scene, &image).await?;
            self.services.events.publish(PipelineEvent::SceneRendered {
                job_id: run_id.to_string(),
                index,
                clip: clip.clone(),
            });
            clips.push(clip);
        }
        Ok(clips)
    }

    /// Mix generated music under the final video. Failures keep the unmixed video.
    async fn add_music(&self, run_id: &str, script: &Script, video: &Path) -> Option<PathBuf> {
        let music = self.services.music.as_ref()?;
        if script.music_prompt.trim().is_empty() {
            return None;
        }

        let track = match music
            .generate_music(&script.music_prompt, &self.layout.music())
            .await
        {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(run_id, error = %e, "music generation failed, keeping video without music");
                return None;
            }
        };

        let mixed = self
            .layout
            .videos()
            .join(format!("final_{}_music.mp4", run_id));
        let options = BackgroundOptions {
            bg_volume: self.background_volume,
            ..BackgroundOptions::default()
        };
        match self
            .services
            .editor
            .add_background_audio(video, &track, &mixed, &options)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(run_id, error = %e, "music mix failed, keeping video without music");
                None
            }
        }
    }
}
