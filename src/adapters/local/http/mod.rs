//! HTTP inbound adapter: the generation API and static access to outputs.

mod form;
mod generate;
mod jobs;

use super::fs::OutputStore;
use crate::application::GenerationService;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: GenerationService,
    pub store: OutputStore,
}

/// Error answered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "request failed");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// The application served on the configured port.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.store.root());
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate::handle))
        .route("/api/jobs", post(jobs::submit))
        .route("/api/jobs/:id", get(jobs::status))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::events::{listener, EventHub};
    use crate::application::pipeline::tests::{pipeline_with, FakeMedia, Recorder, TWO_SCENES};
    use crate::application::JobRegistry;
    use crate::domain::script::PipelineMode;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "edureel-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn form_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", name, value)
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post_form(uri: &str, parts: &[Part]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form_body(parts)))
            .unwrap()
    }

    fn app(root: &Path, answer: &'static str) -> Router {
        let hub = Arc::new(EventHub::new());
        let jobs = Arc::new(JobRegistry::new());
        listener::start(hub.clone(), jobs.clone());
        let media = Arc::new(FakeMedia::new(Arc::new(Recorder::default())));
        let pipeline = pipeline_with(root, PipelineMode::Narrated, answer, media, false, hub);
        router(AppState {
            service: GenerationService::new(Arc::new(pipeline), 1, jobs),
            store: OutputStore::new(root),
        })
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn generate_returns_static_url() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(post_form(
                "/api/generate",
                &[
                    Part::Text("summary", "The letter A"),
                    Part::Text("language", "English"),
                    Part::File("image", "hero.jpg", b"jpeg-bytes"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        let url = body["video_url"].as_str().unwrap();
        assert!(url.starts_with("/static/videos/final_") && url.ends_with(".mp4"));
        assert!(Path::new(body["video_path"].as_str().unwrap()).is_file());

        let uploads: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&uploads[0]).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn missing_language_is_unprocessable() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(post_form("/api/generate", &[Part::Text("summary", "A")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("language"));
        for dir_name in ["videos", "images", "audio", "uploads"] {
            assert!(dir.path().join(dir_name).is_dir());
        }
    }

    #[tokio::test]
    async fn rejected_form_leaves_no_upload_behind() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(post_form(
                "/api/generate",
                &[Part::Text("summary", "A"), Part::File("image", "hero.png", b"png-bytes")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["detail"], "field required: language");

        let uploads = dir.path().join("uploads");
        assert!(uploads.is_dir());
        assert_eq!(std::fs::read_dir(uploads).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn pipeline_failure_is_internal_error() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), "I cannot write that story.")
            .oneshot(post_form(
                "/api/generate",
                &[Part::Text("summary", "A"), Part::Text("language", "English")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn background_job_can_be_polled() {
        let dir = tempdir().unwrap();
        let app = app(dir.path(), TWO_SCENES);
        let response = app
            .clone()
            .oneshot(post_form(
                "/api/jobs",
                &[Part::Text("summary", "A"), Part::Text("language", "English")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        let status_url = body["status_url"].as_str().unwrap().to_string();
        assert_eq!(status_url, format!("/api/jobs/{}", body["job_id"].as_str().unwrap()));

        let mut record = Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(Request::get(status_url.as_str()).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            record = json_body(response).await;
            if record["state"] == "succeeded" || record["state"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(record["state"], "succeeded");
        assert_eq!(record["scenes_done"], 2);
        assert!(record["video_url"].as_str().unwrap().starts_with("/static/videos/"));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let dir = tempdir().unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(Request::get("/api/jobs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn outputs_are_served_statically() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("videos")).unwrap();
        std::fs::write(dir.path().join("videos/clip.mp4"), b"mp4").unwrap();
        let response = app(dir.path(), TWO_SCENES)
            .oneshot(Request::get("/static/videos/clip.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mp4");
    }
}
