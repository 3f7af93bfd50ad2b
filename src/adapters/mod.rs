//! Adapters - Concrete implementations of ports.

pub mod fal;
pub mod gemini;
pub mod local;
pub mod openai;
pub mod task;
pub mod yescale;
