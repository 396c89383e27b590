//! Domain models and API response types

pub mod item;
pub mod responses;

pub use item::{FileRecord, Item};
pub use responses::{FileInfo, ItemResponse, SkippedFileInfo, UploadResponse};
