mod service;

pub use service::{CleanupService, SweepReport};
