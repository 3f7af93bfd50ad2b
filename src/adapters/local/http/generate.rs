use super::{form, ApiError, AppState};
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// Run one pipeline inside the request and answer with the final video.
pub async fn handle(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .ensure_dirs()
        .await
        .map_err(|e| ApiError::internal(format!("could not prepare outputs: {}", e)))?;

    let form = form::read(&state.store, multipart).await?;
    let run_id = Uuid::new_v4().simple().to_string();
    tracing::info!(%run_id, language = %form.language, reference = form.image.is_some(), "generation requested");

    let output = state
        .service
        .generate(form.into_request(run_id))
        .await
        .map_err(|e| ApiError::internal(format!("pipeline failed: {}", e)))?;

    if !tokio::fs::try_exists(&output.video_path).await.unwrap_or(false) {
        return Err(ApiError::internal("pipeline did not produce a valid video"));
    }
    let video_url = output
        .video_url
        .clone()
        .or_else(|| state.store.static_url(&output.video_path));

    Ok(Json(json!({
        "ok": true,
        "video_path": output.video_path,
        "video_url": video_url,
    })))
}
