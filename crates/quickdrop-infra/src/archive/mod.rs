mod service;

pub use service::{create_archive, is_missing_file, ArchiveFile, ArchiveFormat};
