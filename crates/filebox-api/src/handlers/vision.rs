use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::read_file_field;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    response::{IntoResponse, Response},
    Json,
};
use filebox_core::AppError;
use filebox_services::{ImageAnalysis, VisionClient};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct DescribeResponse {
    pub description: String,
}

fn vision_client(state: &AppState) -> Result<&VisionClient, HttpAppError> {
    state.vision.as_ref().ok_or_else(|| {
        AppError::NotConfigured("Image analysis is not configured".to_string()).into()
    })
}

fn vision_error(err: anyhow::Error) -> HttpAppError {
    AppError::Vision(format!("{:#}", err)).into()
}

/// Tags and detected objects for the uploaded image.
#[tracing::instrument(skip_all, fields(operation = "analyze_image"))]
pub async fn analyze_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ImageAnalysis>, HttpAppError> {
    let client = vision_client(&state)?;
    let image = read_file_field(multipart).await?;

    let analysis = client.analyze_image(image).await.map_err(vision_error)?;

    tracing::debug!(
        tags = analysis.tags.len(),
        objects = analysis.objects.len(),
        "Image analyzed"
    );
    Ok(Json(analysis))
}

/// Caption for the uploaded image.
#[tracing::instrument(skip_all, fields(operation = "describe_image"))]
pub async fn describe_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DescribeResponse>, HttpAppError> {
    let client = vision_client(&state)?;
    let image = read_file_field(multipart).await?;

    let description = client.describe_image(image).await.map_err(vision_error)?;

    Ok(Json(DescribeResponse { description }))
}

/// POST on `/api/files/{action}`: the action segment shares its position
/// with download file names, so dispatch happens here. The body is only read
/// as multipart once the action is known.
pub async fn file_action(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    request: Request,
) -> Result<Response, HttpAppError> {
    if !matches!(action.as_str(), "analyze" | "describe") {
        return Err(AppError::NotFound(format!("Unknown file action '{}'", action)).into());
    }

    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

    if action == "analyze" {
        Ok(analyze_image(State(state), multipart).await?.into_response())
    } else {
        Ok(describe_image(State(state), multipart).await?.into_response())
    }
}
