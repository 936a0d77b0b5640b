pub mod activity;
pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod ingest;
pub mod integrity;
pub mod model;
pub mod sanitize;
pub mod vault;

pub use activity::{client_ip, ActivityKind, ActivityLog, Actor};
pub use config::{load_config, load_config_from_str, HashingConfig, ScanConfig, VaultConfig};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, HashError, IntegrityError, Result, ScanError, UploadError, VaultError,
};
pub use hashing::{HashScheduler, HashStatus, HashWorker, SweepStats, SweepTrigger};
pub use ingest::{DirectoryScanner, PreparedUpload, ScanSummary, UploadRegistrar};
pub use integrity::{CorruptEntry, IntegrityTracker};
pub use model::{
    DigestState, Directory, Entry, EntryKind, FileDigests, GameFormat, Md5Digest, Report,
    ReportReason, ReportStatus, Sha256Digest,
};
pub use vault::Vault;
