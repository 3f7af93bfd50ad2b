//! ffmpeg backed editing of generated clips.

pub mod cmd;
pub mod editor;
pub mod frames;

pub use cmd::{FfmpegRunner, RealFfmpegRunner};
pub use editor::FfmpegEditor;
