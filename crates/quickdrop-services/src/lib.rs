//! QuickDrop Services Layer
//!
//! This crate is the business service layer: it coordinates the registry, the storage
//! backend and the archive builder behind the exchange operations (submit, fetch item,
//! fetch file, fetch bundle), and re-exports the infrastructure pieces the API crate needs
//! so that it depends on a single service facade. Keep thin HTTP handling in quickdrop-api.

pub mod exchange;

pub use exchange::{Bundle, ExchangeService, FileDownload, PendingSubmission, Submission};
pub use quickdrop_infra::{ArchiveFormat, CleanupService, SweepReport};
pub use quickdrop_registry::ItemStore;
pub use quickdrop_storage::{LocalStorage, Storage, StorageError, StorageResult};
