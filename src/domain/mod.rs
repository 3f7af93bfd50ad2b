//! Domain layer - Pure business logic.

pub mod av;
pub mod jobs;
pub mod json_repair;
pub mod layout;
pub mod script;
pub mod wav;
