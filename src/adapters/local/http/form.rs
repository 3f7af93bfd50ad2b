use super::ApiError;
use crate::adapters::local::fs::OutputStore;
use crate::application::GenerationRequest;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::path::PathBuf;

/// Fields of a generation form, with the reference picture already on disk.
#[derive(Debug)]
pub struct GenerateForm {
    pub summary: String,
    pub language: String,
    pub image: Option<PathBuf>,
}

impl GenerateForm {
    pub fn into_request(self, run_id: String) -> GenerationRequest {
        GenerationRequest {
            run_id,
            summary: self.summary,
            language: self.language,
            reference_image: self.image,
        }
    }
}

fn missing(field: &str) -> ApiError {
    ApiError::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        format!("field required: {}", field),
    )
}

/// Read `summary`, `language` and the optional `image` file.
pub async fn read(store: &OutputStore, mut multipart: Multipart) -> Result<GenerateForm, ApiError> {
    let mut summary = None;
    let mut language = None;
    let mut image = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(ApiError::bad_request(format!("invalid form: {}", e))),
        };
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("summary") => {
                summary = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?)
            }
            Some("language") => {
                language = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?)
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_owned);
                // Browsers send an empty part when no file was picked.
                if file_name.as_deref().map_or(true, str::is_empty) {
                    continue;
                }
                let path = store
                    .save_upload(file_name.as_deref(), field)
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to save upload: {}", e)))?;
                image = Some(path);
            }
            _ => {}
        }
    }

    let required = summary
        .ok_or_else(|| missing("summary"))
        .and_then(|s| language.ok_or_else(|| missing("language")).map(|l| (s, l)));
    match required {
        Ok((summary, language)) => Ok(GenerateForm {
            summary,
            language,
            image,
        }),
        Err(e) => {
            if let Some(path) = image {
                let _ = tokio::fs::remove_file(path).await;
            }
            Err(e)
        }
    }
}
