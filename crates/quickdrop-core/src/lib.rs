//! QuickDrop Core Library
//!
//! This crate provides the domain models, error types, configuration, pickup code
//! generation and filename normalization shared across all QuickDrop components.

pub mod code;
pub mod config;
pub mod constants;
pub mod error;
pub mod filename;
pub mod models;

// Re-export commonly used types
pub use code::{CodeSource, InvalidCode, PickupCode, RandomCodes};
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileRecord, Item};
