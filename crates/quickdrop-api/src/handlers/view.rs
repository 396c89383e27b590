use super::CodeQuery;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use quickdrop_core::models::ItemResponse;
use quickdrop_infra::ErrorResponse;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/view",
    tag = "exchange",
    params(CodeQuery),
    responses(
        (status = 200, description = "Text and file list of a live item", body = ItemResponse),
        (status = 404, description = "Code unknown or expired", body = ErrorResponse)
    )
)]
pub async fn view_item(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CodeQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (code, item) = state.exchange.fetch_item(query.code.trim()).await?;
    Ok(Json(ItemResponse::new(code, &item)))
}
