//! Route configuration and setup.
//!
//! Exchange endpoints are registered here; health checks live in [health](health).

mod health;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use quickdrop_core::Config;
use quickdrop_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    tracing::info!(
        http_concurrency_limit = config.http_concurrency_limit,
        max_upload_bytes = config.max_upload_bytes(),
        "HTTP limits enabled"
    );

    Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/view", get(handlers::view::view_item))
        .route("/download", get(handlers::download::download_file))
        .route(
            "/download_all",
            get(handlers::download_all::download_bundle),
        )
        .route("/health", get(health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes()))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
