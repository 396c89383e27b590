use crate::code::PickupCode;
use crate::filename::is_image;
use crate::models::{FileRecord, Item};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Public description of one stored file.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileInfo {
    pub name: String,
    pub size_bytes: u64,
    /// Whether the file can be previewed inline as an image
    pub is_image: bool,
}

impl From<&FileRecord> for FileInfo {
    fn from(record: &FileRecord) -> Self {
        Self {
            name: record.display_name.clone(),
            size_bytes: record.size_bytes,
            is_image: is_image(&record.display_name),
        }
    }
}

/// A file that was dropped from a submission because it could not be stored.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedFileInfo {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Six-digit pickup code
    #[schema(value_type = String, example = "042317")]
    pub code: PickupCode,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    pub files: Vec<FileInfo>,
    pub skipped: Vec<SkippedFileInfo>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemResponse {
    #[schema(value_type = String, example = "042317")]
    pub code: PickupCode,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub files: Vec<FileInfo>,
}

impl ItemResponse {
    pub fn new(code: PickupCode, item: &Item) -> Self {
        Self {
            code,
            text: item.text.clone(),
            created_at: item.created_at,
            expires_at: item.expires_at,
            files: item.files.iter().map(FileInfo::from).collect(),
        }
    }
}
