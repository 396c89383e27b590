use crate::error::HttpAppError;
use crate::handlers::download::content_disposition;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use quickdrop_core::AppError;
use quickdrop_infra::ErrorResponse;
use quickdrop_services::ArchiveFormat;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BundleQuery {
    /// Six-digit pickup code
    pub code: String,
    /// Archive format, `zip` (default) or `tar`
    pub format: Option<String>,
}

#[utoipa::path(
    get,
    path = "/download_all",
    tag = "exchange",
    params(BundleQuery),
    responses(
        (status = 200, description = "Archive of every file of the item", content_type = "application/zip"),
        (status = 400, description = "Unsupported archive format", body = ErrorResponse),
        (status = 404, description = "Code unknown or expired, or a file is gone", body = ErrorResponse)
    )
)]
pub async fn download_bundle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BundleQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let format = match query.format.as_deref() {
        None | Some("") => ArchiveFormat::default(),
        Some(value) => value
            .parse::<ArchiveFormat>()
            .map_err(|e| AppError::InvalidInput(e.to_string()))?,
    };

    let bundle = state
        .exchange
        .fetch_bundle(query.code.trim(), format)
        .await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, bundle.format.content_type())
        .header(header::CONTENT_LENGTH, bundle.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition("attachment", &bundle.filename),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(bundle.stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
