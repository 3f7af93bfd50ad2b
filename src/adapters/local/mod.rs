//! Local adapters: disk outputs, in-process events and the HTTP API.

pub mod events;
pub mod fs;
pub mod http;

pub use events::hub::EventHub;
pub use fs::OutputStore;
pub use http::{router, AppState};
