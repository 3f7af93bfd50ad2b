//! Where generated files live under the output root.

use std::path::{Component, Path, PathBuf};

/// Directories that must exist before the service accepts requests.
pub const REQUIRED_DIRS: [&str; 4] = ["videos", "images", "audio", "uploads"];

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn videos(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn images(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn audio(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn music(&self) -> PathBuf {
        self.root.join("music")
    }

    pub fn scripts(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn script_path(&self, run_id: &str) -> PathBuf {
        self.scripts().join(format!("{}.json", run_id))
    }

    pub fn final_video_path(&self, run_id: &str) -> PathBuf {
        self.videos().join(format!("final_{}.mp4", run_id))
    }

    pub fn last_frame_path(&self, run_id: &str) -> PathBuf {
        self.images().join(format!("last_frame_{}.png", run_id))
    }

    /// URL under `/static` for a file inside the root, `None` for anything outside it.
    pub fn static_url(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(format!("/static/{}", segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted() {
        let layout = OutputLayout::new("outputs");
        assert_eq!(
            layout.final_video_path("abc"),
            PathBuf::from("outputs/videos/final_abc.mp4")
        );
        assert_eq!(
            layout.script_path("abc"),
            PathBuf::from("outputs/scripts/abc.json")
        );
        assert_eq!(
            layout.last_frame_path("abc"),
            PathBuf::from("outputs/images/last_frame_abc.png")
        );
    }

    #[test]
    fn static_url_is_relative_to_root() {
        let layout = OutputLayout::new("outputs");
        assert_eq!(
            layout
                .static_url(Path::new("outputs/videos/final_abc.mp4"))
                .as_deref(),
            Some("/static/videos/final_abc.mp4")
        );
    }

    #[test]
    fn static_url_refuses_escapes() {
        let layout = OutputLayout::new("outputs");
        assert!(layout.static_url(Path::new("elsewhere/x.mp4")).is_none());
        assert!(layout.static_url(Path::new("outputs/../x.mp4")).is_none());
        assert!(layout.static_url(Path::new("outputs")).is_none());
    }
}
