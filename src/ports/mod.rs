//! Ports - Traits the application depends on.

pub mod editor;
pub mod events;
pub mod generators;
pub mod llm;
