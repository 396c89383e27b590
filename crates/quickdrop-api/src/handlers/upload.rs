use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::receive_submission;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use quickdrop_core::models::{FileInfo, UploadResponse};
use quickdrop_infra::ErrorResponse;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "exchange",
    request_body(
        content = inline(Object),
        content_type = "multipart/form-data",
        description = "Optional `text` field and any number of `files` parts"
    ),
    responses(
        (status = 201, description = "Stored under a new pickup code", body = UploadResponse),
        (status = 400, description = "Nothing to store or malformed form", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorResponse),
        (status = 500, description = "No file could be stored", body = ErrorResponse),
        (status = 503, description = "No pickup code available", body = ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let submission = receive_submission(&state.exchange, multipart).await?;

    let response = UploadResponse {
        code: submission.code.clone(),
        expires_at: submission.item.expires_at,
        ttl_seconds: state.exchange.ttl().num_seconds(),
        files: submission.item.files.iter().map(FileInfo::from).collect(),
        skipped: submission.skipped,
    };

    Ok((StatusCode::CREATED, Json(response)))
}
