use crate::constants::UPLOAD_FIELD;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::store_field;
use axum::{
    body::Body,
    extract::{Multipart, OriginalUri, Path, State},
    http::{header, Response, StatusCode},
    Json,
};
use filebox_core::AppError;
use filebox_storage::ObjectKey;
use futures::StreamExt;
use std::sync::Arc;

/// List stored files as download URLs relative to the request path.
#[tracing::instrument(skip_all, fields(operation = "list_files"))]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Vec<String>>, HttpAppError> {
    let names = state.storage.list_names().await?;

    let base_path = uri.path().trim_end_matches('/');
    let urls = names
        .iter()
        .map(|key| format!("{}/{}", base_path, key))
        .collect::<Vec<_>>();

    tracing::debug!(count = urls.len(), "Listed files");
    Ok(Json(urls))
}

/// Store the `file` field under its sanitized name, replacing any file
/// already stored under that name.
#[tracing::instrument(skip_all, fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<StatusCode, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let key = ObjectKey::sanitize(&original_name)?;

        store_field(state.storage.as_ref(), &key, field).await?;

        tracing::info!(
            key = %key,
            original_filename = %original_name,
            "File uploaded"
        );
        return Ok(StatusCode::ACCEPTED);
    }

    Err(AppError::InvalidInput(format!(
        "No file provided; send a multipart field named '{}'",
        UPLOAD_FIELD
    ))
    .into())
}

/// Stream a stored file back as an attachment.
///
/// Content type is never recorded at upload, so every file is served as
/// `application/octet-stream`.
#[tracing::instrument(skip(state), fields(operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response<Body>, HttpAppError> {
    // A name that is not a valid key can never have been stored.
    let key = ObjectKey::parse(&filename)
        .map_err(|_| AppError::NotFound(format!("File '{}' not found", filename)))?;

    let stream = state.storage.load(&key).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!("attachment; filename=\"{}\"", key);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
