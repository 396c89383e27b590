//! OpenAPI documentation, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::handlers;
use quickdrop_core::models;
use quickdrop_infra::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "QuickDrop API",
        version = "0.1.0",
        description = "Share a text snippet and files through a six-digit pickup code. Items expire after a fixed time to live and their files are deleted by a background reaper."
    ),
    paths(
        handlers::upload::upload,
        handlers::view::view_item,
        handlers::download::download_file,
        handlers::download_all::download_bundle,
    ),
    components(schemas(
        models::UploadResponse,
        models::ItemResponse,
        models::FileInfo,
        models::SkippedFileInfo,
        ErrorResponse,
    )),
    tags(
        (name = "exchange", description = "Submit and retrieve items by pickup code")
    )
)]
pub struct ApiDoc;
