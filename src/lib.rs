//! edureel - Educational video generation service
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (script, jobs, layout, av editing)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (Gemini, OpenAI, YesScale, FAL, local HTTP)
//! - application/: Script writing, the generation pipeline and job tracking
//! - config: Environment configuration
//!
//! # Features
//! - `native-frames`: decode last frames in-process with the ffmpeg libraries

pub mod adapters;
pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use adapters::local::{router, AppState, OutputStore};
pub use config::AppConfig;
pub use error::Error;
