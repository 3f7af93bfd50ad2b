//! Wiring of adapters into a running application.

use crate::adapters::fal::FalSpeech;
use crate::adapters::gemini::{
    GeminiClient, GeminiImages, GeminiLlm, GeminiSpeech, VeoVideo, VEO2_MODEL, VEO3_MODEL,
};
use crate::adapters::local::events::{listener, EventHub};
use crate::adapters::local::{AppState, OutputStore};
use crate::adapters::openai::OpenAiLlm;
use crate::adapters::yescale::{SunoMusic, YesScaleVideo};
use crate::application::completion::{gemini_script_spec, openai_script_spec};
use crate::application::{
    GenerationService, JobRegistry, Pipeline, PipelineServices, ProviderEntry, ScriptWriter,
};
use crate::config::{AppConfig, SpeechProvider, VideoProvider};
use crate::domain::av::{FfmpegEditor, RealFfmpegRunner};
use crate::domain::script::PipelineMode;
use crate::domain::layout::OutputLayout;
use crate::ports::generators::{MusicGenerator, SpeechSynthesizer, VideoGenerator};
use std::sync::Arc;

/// Script providers in the order they are tried.
pub fn script_providers(config: &AppConfig, gemini: &GeminiClient) -> Vec<ProviderEntry> {
    let mut providers = Vec::new();
    if config.gemini.api_key.is_some() {
        providers.push(ProviderEntry::new(
            Arc::new(GeminiLlm::new(gemini.clone())),
            gemini_script_spec(),
        ));
    }
    if let Some(key) = &config.openai.api_key {
        providers.push(ProviderEntry::new(
            Arc::new(OpenAiLlm::new(key.clone(), config.openai.base_url.clone())),
            openai_script_spec(&config.openai.script_model),
        ));
    }
    providers
}

/// Veo model for the configured mode. Native-audio clips need Veo 3's soundtrack.
pub fn veo_model(config: &AppConfig) -> String {
    if let Some(model) = &config.gemini.veo_model {
        return model.clone();
    }
    match config.pipeline.mode {
        PipelineMode::Narrated => VEO2_MODEL.to_string(),
        PipelineMode::NativeAudio => VEO3_MODEL.to_string(),
    }
}

pub fn video_generator(config: &AppConfig, gemini: &GeminiClient) -> Arc<dyn VideoGenerator> {
    match config.pipeline.video_provider {
        VideoProvider::Veo => Arc::new(VeoVideo::new(gemini.clone()).with_model(veo_model(config))),
        VideoProvider::YesScale => {
            if config.pipeline.mode == PipelineMode::NativeAudio {
                tracing::warn!("yescale renders silent clips, native-audio runs need VIDEO_PROVIDER=veo");
            }
            Arc::new(YesScaleVideo::new(
                config.yescale.video_base_url.clone(),
                config.yescale.video_api_key.clone(),
            ))
        }
    }
}

/// Build the pipeline and its services from configuration.
///
/// Events go to `events`; nothing here talks to the network yet, so missing
/// keys only surface when a generation runs.
pub fn build_pipeline(config: &AppConfig, events: Arc<EventHub>) -> Pipeline {
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, image generation will fail");
    }
    let gemini = GeminiClient::new(
        config.gemini.api_key.clone().unwrap_or_default(),
        config.gemini.base_url.clone(),
    );

    let providers = script_providers(config, &gemini);
    if providers.is_empty() {
        tracing::warn!("no script provider configured");
    }

    let videos = video_generator(config, &gemini);
    let speech: Arc<dyn SpeechSynthesizer> = match config.pipeline.speech_provider {
        SpeechProvider::Gemini => Arc::new(GeminiSpeech::new(gemini.clone())),
        SpeechProvider::Fal => Arc::new(FalSpeech::new(
            config.fal.base_url.clone(),
            config.fal.api_key.clone(),
            config.fal.voice_id.clone(),
        )),
    };
    let music: Option<Arc<dyn MusicGenerator>> = config.pipeline.background_music.then(|| {
        Arc::new(SunoMusic::new(
            config.yescale.base_url.clone(),
            config.yescale.music_api_key.clone(),
        )) as Arc<dyn MusicGenerator>
    });

    tracing::info!(
        mode = ?config.pipeline.mode,
        video = ?config.pipeline.video_provider,
        speech = ?config.pipeline.speech_provider,
        music = config.pipeline.background_music,
        script_providers = providers.len(),
        "pipeline configured"
    );

    Pipeline::new(
        OutputLayout::new(config.output_dir.clone()),
        config.pipeline.mode,
        f64::from(config.pipeline.background_volume),
        PipelineServices {
            writer: ScriptWriter::new(providers),
            images: Arc::new(GeminiImages::new(gemini)),
            videos,
            speech,
            editor: Arc::new(FfmpegEditor::new(RealFfmpegRunner)),
            music,
            events,
        },
    )
}

/// Everything the HTTP layer needs. Must be called inside a tokio runtime.
pub fn build_state(config: &AppConfig) -> AppState {
    let hub = Arc::new(EventHub::new());
    let jobs = Arc::new(JobRegistry::new());
    listener::start(hub.clone(), jobs.clone());

    let pipeline = build_pipeline(config, hub);
    AppState {
        service: GenerationService::new(Arc::new(pipeline), config.pipeline.max_concurrent, jobs),
        store: OutputStore::new(config.output_dir.clone()),
    }
}
