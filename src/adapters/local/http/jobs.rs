use super::{form, ApiError, AppState};
use crate::domain::jobs::JobRecord;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// Queue a pipeline run and answer immediately with where to poll it.
pub async fn submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .store
        .ensure_dirs()
        .await
        .map_err(|e| ApiError::internal(format!("could not prepare outputs: {}", e)))?;

    let form = form::read(&state.store, multipart).await?;
    let job_id = state
        .service
        .submit(form.into_request(Uuid::new_v4().simple().to_string()));
    tracing::info!(%job_id, "job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": job_id,
            "status_url": format!("/api/jobs/{}", job_id),
        })),
    ))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .service
        .jobs()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("job {} not found", id)))
}
