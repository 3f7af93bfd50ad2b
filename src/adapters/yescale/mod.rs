//! YesScale hosted generation APIs.

pub mod music;
pub mod video;

pub use music::SunoMusic;
pub use video::YesScaleVideo;
