//! Shared constants

/// Number of decimal digits in a pickup code.
pub const CODE_DIGITS: usize = 6;

/// Size of the pickup code keyspace (`10^CODE_DIGITS`).
pub const CODE_SPACE: u32 = 1_000_000;

/// Default item time-to-live in seconds.
pub const DEFAULT_ITEM_TTL_SECS: u64 = 300;

/// Default interval between reaper sweeps in seconds.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 30;

/// Default age after which an unfinished upload is abandoned and its files reclaimed.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 3600;

/// Default maximum upload size in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 768;

/// Default cap on concurrently served HTTP requests.
pub const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default directory for persisted uploads.
pub const DEFAULT_STORAGE_PATH: &str = "./quickdrop-data";

/// Prefix of every persisted upload file name.
pub const STORAGE_KEY_PREFIX: &str = "tmp_";

/// Extensions rendered as inline image previews.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
