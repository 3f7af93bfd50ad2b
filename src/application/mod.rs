//! Application layer - Services composed from ports.

pub mod completion;
pub mod jobs;
pub mod pipeline;
pub mod service;

pub use completion::{ProviderEntry, ScriptWriter};
pub use jobs::JobRegistry;
pub use pipeline::{GenerationOutput, GenerationRequest, Pipeline, PipelineServices};
pub use service::GenerationService;
