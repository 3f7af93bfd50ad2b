use crate::adapters::task::{self, PollSettings, TaskStatus};
use crate::error::GenerationError;
use crate::ports::generators::MusicGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;

const SERVICE: &str = "suno";

/// Background music through the YesScale Suno endpoint.
#[derive(Debug, Clone)]
pub struct SunoMusic {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pub tags: String,
    pub model_version: String,
    pub title: Option<String>,
    pub poll: PollSettings,
}

impl SunoMusic {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            tags: "emotional punk".to_string(),
            model_version: "chirp-v4".to_string(),
            title: None,
            poll: PollSettings::secs(5, 600),
        }
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
impl MusicGenerator for SunoMusic {
    async fn generate_music(
        &self,
        prompt: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey("YESCALE_MUSIC_API_KEY"))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let body = json!({
            "prompt": prompt,
            "tags": self.tags,
            "mv": self.model_version,
            "title": self.title.as_deref().unwrap_or("Untitled Track"),
        });
        let submitted = task::post_json(
            &self.client,
            SERVICE,
            &format!("{}/suno/submit/music", self.base_url),
            api_key,
            &body,
        )
        .await?;
        let task_id = match submitted.get("data") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(GenerationError::NoTaskId { service: SERVICE }),
        };
        tracing::info!(%task_id, "music task submitted");

        let fetch_url = format!("{}/suno/fetch/{}", self.base_url, task_id);
        let started = Instant::now();
        loop {
            let fetched = task::get_json(&self.client, SERVICE, &fetch_url, api_key).await?;
            let data = fetched.get("data").cloned().unwrap_or(Value::Null);
            let status = data.get("status").and_then(Value::as_str).unwrap_or("");

            match TaskStatus::parse(status) {
                TaskStatus::Succeeded => {
                    let audio_url = data
                        .pointer("/data/0/audio_url")
                        .and_then(Value::as_str)
                        .filter(|url| !url.is_empty())
                        .ok_or(GenerationError::NoOutput { service: SERVICE })?;
                    let dest = output_dir.join(format!(
                        "{}{}",
                        task_id,
                        task::resolve_suffix(audio_url, ".mp3")
                    ));
                    return task::download(&self.client, SERVICE, audio_url, &dest).await;
                }
                TaskStatus::Failed => {
                    let reason = task::first_str(&data, &["/message"])
                        .unwrap_or_else(|| "unknown reason".to_string());
                    return Err(GenerationError::TaskFailed {
                        service: SERVICE,
                        reason,
                    });
                }
                TaskStatus::Pending => {}
            }

            if started.elapsed() > self.poll.timeout {
                return Err(GenerationError::Timeout {
                    service: SERVICE,
                    secs: self.poll.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{
        extract::State,
        http::HeaderMap,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Fake {
        polls: Arc<AtomicUsize>,
        submitted: Arc<Mutex<Option<Value>>>,
        fail: bool,
        base: Arc<Mutex<String>>,
    }

    async fn submit(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(headers["authorization"], "Bearer music-key");
        *fake.submitted.lock().unwrap() = Some(body);
        Json(json!({"code": "success", "data": "task-7"}))
    }

    async fn fetch(State(fake): State<Fake>) -> Json<Value> {
        if fake.polls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Json(json!({"data": {"status": "IN_PROGRESS"}}));
        }
        if fake.fail {
            return Json(json!({"data": {"status": "FAILED", "message": "quota exceeded"}}));
        }
        let base = fake.base.lock().unwrap().clone();
        Json(json!({"data": {"status": "SUCCESS", "data": [
            {"audio_url": format!("{}/cdn/track.m4a?sig=x", base)}
        ]}}))
    }

    async fn start(fail: bool) -> (Fake, String) {
        let fake = Fake {
            fail,
            ..Fake::default()
        };
        let app = Router::new()
            .route("/suno/submit/music", post(submit))
            .route("/suno/fetch/:id", get(fetch))
            .route("/cdn/track.m4a", get(|| async { "music" }))
            .with_state(fake.clone());
        let base = serve(app).await;
        *fake.base.lock().unwrap() = base.clone();
        (fake, base)
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn downloads_finished_track() {
        let (fake, base) = start(false).await;
        let dir = tempdir().unwrap();
        let music = SunoMusic::new(base, Some("music-key".into())).with_poll(fast());

        let path = music
            .generate_music("  happy beach song ", dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("task-7.m4a"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "music");

        let body = fake.submitted.lock().unwrap().clone().unwrap();
        assert_eq!(body["prompt"], "happy beach song");
        assert_eq!(body["tags"], "emotional punk");
        assert_eq!(body["mv"], "chirp-v4");
        assert_eq!(body["title"], "Untitled Track");
    }

    #[tokio::test]
    async fn failed_task_carries_reason() {
        let (_fake, base) = start(true).await;
        let dir = tempdir().unwrap();
        let music = SunoMusic::new(base, Some("music-key".into())).with_poll(fast());
        match music.generate_music("song", dir.path()).await {
            Err(GenerationError::TaskFailed { reason, .. }) => assert_eq!(reason, "quota exceeded"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn requires_key_and_prompt() {
        let music = SunoMusic::new("http://127.0.0.1:9", None);
        assert!(matches!(
            music.generate_music("x", Path::new(".")).await,
            Err(GenerationError::MissingApiKey(_))
        ));
        let music = SunoMusic::new("http://127.0.0.1:9", Some("k".into()));
        assert!(matches!(
            music.generate_music("   ", Path::new(".")).await,
            Err(GenerationError::EmptyPrompt)
        ));
    }
}
