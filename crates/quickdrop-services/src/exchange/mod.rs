mod service;

pub use service::{Bundle, ExchangeService, FileDownload, PendingSubmission, Submission};
