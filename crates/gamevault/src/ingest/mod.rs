//! Getting game files into the store: directory scans and uploads.

pub mod scanner;
pub mod upload;

pub use scanner::{DirectoryScanner, ScanSummary, DEFAULT_MAX_DEPTH};
pub use upload::{PreparedUpload, UploadRegistrar};
