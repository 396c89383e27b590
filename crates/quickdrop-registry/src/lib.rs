//! QuickDrop Registry Library
//!
//! In-memory mapping from pickup code to item. This is the only shared mutable structure in
//! the exchange; every operation runs under a single exclusive lock.

pub mod store;

pub use store::{ItemStore, RegistryError, Reservation};
