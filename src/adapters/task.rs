//! Helpers for submit-then-poll generation APIs.

use crate::error::GenerationError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;

/// How often to poll a task, and for how long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub const fn secs(interval: u64, timeout: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "success" | "done" => TaskStatus::Succeeded,
            "failed" | "error" => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }
}

/// Find the task identifier in a submit response, searching nested objects.
pub fn extract_task_id(payload: &Value) -> Option<String> {
    match payload {
        Value::Object(map) => {
            for key in ["task_id", "request_id", "id", "data"] {
                match map.get(key) {
                    Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                    Some(Value::Number(n)) => return Some(n.to_string()),
                    _ => {}
                }
            }
            map.values().find_map(extract_task_id)
        }
        Value::Array(items) => items.iter().find_map(extract_task_id),
        _ => None,
    }
}

/// First string stored under one of `keys`, depth first.
pub fn find_url(payload: &Value, keys: &[&str]) -> Option<String> {
    match payload {
        Value::Object(map) => map.iter().find_map(|(key, value)| match value {
            Value::String(s) if keys.contains(&key.as_str()) => Some(s.clone()),
            other => find_url(other, keys),
        }),
        Value::Array(items) => items.iter().find_map(|item| find_url(item, keys)),
        _ => None,
    }
}

/// First non-empty string found at one of the JSON `pointers`.
pub fn first_str(payload: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| {
        payload
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// File extension of the URL path, with its dot, or `default`.
pub fn resolve_suffix(url: &str, default: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext),
        _ => default.to_string(),
    }
}

/// URLs and data URLs pass through, local files become base64 data URLs.
pub async fn prepare_image_input(source: &str) -> Result<String, GenerationError> {
    let lowered = source.to_ascii_lowercase();
    if ["http://", "https://", "data:"]
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Ok(source.to_string());
    }

    let path = Path::new(source);
    if !path.is_file() {
        return Err(GenerationError::ImageNotFound(path.to_path_buf()));
    }
    let mime = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/png".to_string());
    let bytes = tokio::fs::read(path).await?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

fn bearer(request: RequestBuilder, api_key: &str) -> RequestBuilder {
    request
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Accept", "application/json")
}

async fn read_json(
    service: &'static str,
    response: reqwest::Response,
) -> Result<Value, GenerationError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(GenerationError::RequestFailed {
            service,
            reason: format!("HTTP {}: {}", status, text),
        });
    }
    Ok(serde_json::from_str(&text)?)
}

pub async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    service: &'static str,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<Value, GenerationError> {
    let response = bearer(client.post(url), api_key)
        .timeout(Duration::from_secs(30))
        .json(body)
        .send()
        .await?;
    read_json(service, response).await
}

pub async fn get_json(
    client: &Client,
    service: &'static str,
    url: &str,
    api_key: &str,
) -> Result<Value, GenerationError> {
    let response = bearer(client.get(url), api_key)
        .timeout(Duration::from_secs(30))
        .send()
        .await?;
    read_json(service, response).await
}

/// Stream `url` into `dest`, creating parent directories.
pub async fn download(
    client: &Client,
    service: &'static str,
    url: &str,
    dest: &Path,
) -> Result<PathBuf, GenerationError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GenerationError::RequestFailed {
            service,
            reason: format!("download of {} failed with HTTP {}", url, status),
        });
    }

    let body = response.bytes_stream().map_err(io::Error::other);
    let body_reader = StreamReader::new(body);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(dest).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    tracing::debug!(service, ?dest, "downloaded");
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{routing::get, Router};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn status_words_are_normalised() {
        assert_eq!(TaskStatus::parse("SUCCESS"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("done"), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::parse("Error"), TaskStatus::Failed);
        assert_eq!(TaskStatus::parse("IN_PROGRESS"), TaskStatus::Pending);
        assert_eq!(TaskStatus::parse(""), TaskStatus::Pending);
    }

    #[test]
    fn task_id_is_found_in_nested_payloads() {
        assert_eq!(extract_task_id(&json!({"data": "abc"})), Some("abc".into()));
        assert_eq!(extract_task_id(&json!({"id": 42})), Some("42".into()));
        assert_eq!(
            extract_task_id(&json!({"code": 0, "result": {"request_id": "r-1"}})),
            Some("r-1".into())
        );
        assert_eq!(
            extract_task_id(&json!({"items": [{"task_id": "t-9"}]})),
            Some("t-9".into())
        );
        assert_eq!(extract_task_id(&json!({"data": ""})), None);
    }

    #[test]
    fn url_lookup_walks_arrays() {
        let payload = json!({
            "status": "success",
            "data": {"outputs": [{"name": "x"}, {"video_url": "https://cdn/x.mp4"}]}
        });
        assert_eq!(
            find_url(&payload, &["video_url", "url"]),
            Some("https://cdn/x.mp4".into())
        );
        assert_eq!(find_url(&payload, &["audio_url"]), None);
    }

    #[test]
    fn first_str_skips_missing_pointers() {
        let payload = json!({"status": "", "task": {"status": "running"}});
        assert_eq!(
            first_str(&payload, &["/status", "/state", "/task/status"]),
            Some("running".into())
        );
    }

    #[test]
    fn suffix_comes_from_url_path() {
        assert_eq!(resolve_suffix("https://cdn/a/song.m4a?sig=1", ".mp3"), ".m4a");
        assert_eq!(resolve_suffix("https://cdn/a/song", ".mp3"), ".mp3");
        assert_eq!(resolve_suffix("https://cdn/a/", ".mp4"), ".mp4");
    }

    #[tokio::test]
    async fn image_inputs() {
        assert_eq!(
            prepare_image_input("https://x/y.png").await.unwrap(),
            "https://x/y.png"
        );

        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"abc").unwrap();
        let data_url = prepare_image_input(path.to_str().unwrap()).await.unwrap();
        assert_eq!(data_url, "data:image/jpeg;base64,YWJj");

        let missing = dir.path().join("nope.png");
        assert!(matches!(
            prepare_image_input(missing.to_str().unwrap()).await,
            Err(GenerationError::ImageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn download_streams_to_nested_file() {
        let base = serve(Router::new().route("/file.mp3", get(|| async { "audio-bytes" }))).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("music/song.mp3");

        let saved = download(&Client::new(), "test", &format!("{}/file.mp3", base), &dest)
            .await
            .unwrap();
        assert_eq!(saved, dest);
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "audio-bytes");
    }

    #[tokio::test]
    async fn download_reports_http_errors() {
        let base = serve(Router::new()).await;
        let dir = tempdir().unwrap();
        let err = download(
            &Client::new(),
            "test",
            &format!("{}/missing", base),
            &dir.path().join("x"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::RequestFailed { .. }));
    }
}
