//! QuickDrop HTTP API
//!
//! Routes, handlers and server setup for the pickup-code exchange. The binary in `main.rs`
//! only parses the command line and hands over to [`setup`].

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod utils;
