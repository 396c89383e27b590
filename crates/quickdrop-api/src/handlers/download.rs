use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use quickdrop_core::filename::{content_type_for, is_image};
use quickdrop_core::AppError;
use quickdrop_infra::ErrorResponse;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Six-digit pickup code
    pub code: String,
    /// Display name of the file
    pub file: String,
    /// `1` to show images inline instead of as an attachment
    pub preview: Option<String>,
}

impl DownloadQuery {
    fn wants_preview(&self) -> bool {
        matches!(self.preview.as_deref(), Some("1") | Some("true"))
    }
}

/// Build a `Content-Disposition` value that survives non-ASCII names.
pub fn content_disposition(disposition: &str, filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c: char| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition,
        fallback,
        urlencoding::encode(filename)
    )
}

#[utoipa::path(
    get,
    path = "/download",
    tag = "exchange",
    params(DownloadQuery),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Code, file or stored content not found", body = ErrorResponse)
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let download = state
        .exchange
        .fetch_file(query.code.trim(), &query.file)
        .await?;

    let name = &download.record.display_name;
    let disposition = if query.wants_preview() && is_image(name) {
        "inline"
    } else {
        "attachment"
    };

    tracing::debug!(
        display_name = %name,
        storage_key = %download.record.storage_key,
        disposition,
        "Serving file"
    );

    let body_stream = download.stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(name))
        .header(header::CONTENT_LENGTH, download.record.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(disposition, name),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
