//! QuickDrop Infrastructure Library
//!
//! This crate provides the infrastructure pieces around the exchange:
//! - Reaper (background eviction of expired items)
//! - Archive creation for bundle downloads
//! - Telemetry initialization
//! - HTTP middleware (request ID) and the error response body

pub mod archive;
pub mod cleanup;
pub mod error;
pub mod middleware;
pub mod telemetry;

pub use archive::{create_archive, is_missing_file, ArchiveFile, ArchiveFormat};
pub use cleanup::{CleanupService, SweepReport};
pub use error::ErrorResponse;
pub use middleware::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use telemetry::{init_telemetry, shutdown_telemetry};
