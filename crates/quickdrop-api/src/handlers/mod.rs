pub mod download;
pub mod download_all;
pub mod upload;
pub mod view;

use serde::Deserialize;
use utoipa::IntoParams;

/// Query carrying only a pickup code.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CodeQuery {
    /// Six-digit pickup code
    pub code: String,
}
