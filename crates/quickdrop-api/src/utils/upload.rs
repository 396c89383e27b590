//! Multipart intake for submissions

use std::io;

use axum::extract::Multipart;
use axum::http::StatusCode;
use futures::StreamExt;
use quickdrop_core::AppError;
use quickdrop_services::{ExchangeService, Submission};
use tokio_util::io::StreamReader;

use crate::error::multipart_error;

/// Form field carrying the optional text snippet.
pub const TEXT_FIELD: &str = "text";

/// Form field names accepted for file parts.
pub const FILE_FIELDS: [&str; 2] = ["files", "file"];

/// Stream a multipart form into a new submission.
///
/// Files are written to storage as their parts arrive, never buffered whole. Any failure of
/// the request body aborts the submission and reclaims what was already stored.
pub async fn receive_submission(
    exchange: &ExchangeService,
    mut multipart: Multipart,
) -> Result<Submission, AppError> {
    let mut pending = exchange.begin_submission().await?;
    let mut text: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                pending.abort().await;
                return Err(multipart_error(e));
            }
        };

        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if field_name == TEXT_FIELD {
            match field.text().await {
                Ok(value) => text = Some(value),
                Err(e) => {
                    pending.abort().await;
                    return Err(multipart_error(e));
                }
            }
            continue;
        }

        if !FILE_FIELDS.contains(&field_name.as_str()) {
            tracing::debug!(field = %field_name, "Ignoring unknown form field");
            continue;
        }

        // An empty file input still sends a part, without a name.
        let Some(file_name) = field
            .file_name()
            .map(|s: &str| s.to_string())
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        let mut body_status: Option<StatusCode> = None;
        let result = {
            let body = field.map(|chunk| {
                chunk.map_err(|e| {
                    body_status = Some(e.status());
                    io::Error::other(e.body_text())
                })
            });
            let reader = StreamReader::new(body);
            tokio::pin!(reader);
            pending.add_file(&file_name, &mut reader).await
        };

        if let Err(e) = result {
            pending.abort().await;
            if body_status == Some(StatusCode::PAYLOAD_TOO_LARGE) {
                return Err(AppError::PayloadTooLarge(
                    "Upload exceeds the maximum allowed size".to_string(),
                ));
            }
            return Err(e);
        }
    }

    pending.commit(text).await
}
