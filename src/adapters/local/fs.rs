use crate::domain::layout::{OutputLayout, REQUIRED_DIRS};
use axum::{body::Bytes, BoxError};
use futures::{Stream, TryStreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::{fs::File, io::AsyncWriteExt, io::BufWriter};
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// The output root on local disk, also served under `/static`.
#[derive(Debug, Clone)]
pub struct OutputStore {
    layout: OutputLayout,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: OutputLayout::new(root),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Create the directories the service needs. Safe to call repeatedly.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in REQUIRED_DIRS {
            tokio::fs::create_dir_all(self.layout.root().join(dir)).await?;
        }
        Ok(())
    }

    /// A fresh path under `uploads/` keeping a sane extension of `original_name`.
    pub fn upload_path(&self, original_name: Option<&str>) -> PathBuf {
        let ext = original_name.and_then(upload_extension).unwrap_or("png");
        self.layout
            .uploads()
            .join(format!("{}.{}", Uuid::new_v4(), ext))
    }

    pub fn static_url(&self, path: &Path) -> Option<String> {
        self.layout.static_url(path)
    }

    /// Stream an uploaded file under `uploads/` and return where it landed.
    pub async fn save_upload<S, E>(&self, original_name: Option<&str>, stream: S) -> io::Result<PathBuf>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let path = self.upload_path(original_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        stream_to_file(&path, stream).await?;
        tracing::info!(?path, "upload saved");
        Ok(path)
    }
}

fn upload_extension(name: &str) -> Option<&str> {
    let ext = Path::new(name).extension()?.to_str()?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

/// Save a `Stream` to a file
pub async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;
    Ok(())
}
