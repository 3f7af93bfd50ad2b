//! In-process fan-out of pipeline progress.

pub mod hub;
pub mod listener;

pub use hub::EventHub;
