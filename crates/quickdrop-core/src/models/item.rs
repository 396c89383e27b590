use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One persisted file.
///
/// The storage key is owned exclusively by this record; no two records (and no two items)
/// ever share a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Backend-relative location of the bytes.
    pub storage_key: String,
    /// Normalized name; the public identity used for lookups and archive entries.
    pub display_name: String,
    pub size_bytes: u64,
}

/// One submission: optional text plus an ordered list of files, alive until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub files: Vec<FileRecord>,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        files: Vec<FileRecord>,
        text: Option<String>,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            files,
            text,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Live for every instant in `[created_at, expires_at)`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn file(&self, display_name: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.display_name == display_name)
    }
}
