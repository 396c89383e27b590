//! QuickDrop Storage Library
//!
//! This crate owns the on-disk lifecycle of uploaded files: persisting byte streams,
//! opening them for reads and removing them when their item is reclaimed.
//!
//! # Storage key format
//!
//! Every file is stored under `tmp_{code}_{display_name}` relative to the backend root.
//! The code makes keys of concurrently uploaded items disjoint and the display name is
//! unique within one item. Key generation lives in the `keys` module.

pub mod keys;
pub mod local;
pub mod traits;

pub use keys::generate_storage_key;
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
