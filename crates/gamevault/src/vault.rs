//! Wiring of the ingestion, hashing and integrity components around one store.
//!
//! Each `Vault` owns its own components, so independent instances (one per
//! test, say) never share state.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use log::info;

use crate::activity::{ActivityLog, Actor};
use crate::config::VaultConfig;
use crate::db::activity_repo::ActivityRow;
use crate::db::{entry_repo, Database};
use crate::error::{HashError, Result};
use crate::hashing::{HashScheduler, HashStatus, HashWorker, SweepStats, SweepTrigger};
use crate::ingest::{DirectoryScanner, PreparedUpload, ScanSummary, UploadRegistrar};
use crate::integrity::{CorruptEntry, IntegrityTracker};
use crate::model::{Directory, Entry, Report};

/// Request-facing entry points of the vault.
pub struct Vault {
    db: Database,
    scanner: DirectoryScanner,
    uploads: UploadRegistrar,
    hasher: HashWorker,
    integrity: IntegrityTracker,
    activity: ActivityLog,
    scheduler: Option<HashScheduler>,
}

impl Vault {
    /// Builds a vault over an open database.
    pub fn new(db: Database, config: &VaultConfig) -> Self {
        Self {
            scanner: DirectoryScanner::new(db.clone(), config.scan.max_depth),
            uploads: UploadRegistrar::new(db.clone(), config.upload_directory.clone()),
            hasher: HashWorker::new(db.clone(), config.hashing.clone()),
            integrity: IntegrityTracker::new(db.clone()),
            activity: ActivityLog::new(db.clone()),
            scheduler: None,
            db,
        }
    }

    /// Opens the configured database and builds a vault over it.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        let path = config.resolved_database_path().ok_or_else(|| {
            crate::error::ConfigError::Validation {
                message: "no database_path configured and no home directory found".to_string(),
            }
        })?;
        let db = Database::open(&path)?;
        Ok(Self::new(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // --- Scheduler lifecycle ---

    /// Starts background hashing. Returns a handle to join after
    /// [`stop_hashing`](Self::stop_hashing).
    pub fn start_hashing(&mut self) -> Result<JoinHandle<()>> {
        if self.scheduler.is_some() {
            return Err(HashError::TaskFailed("hashing already started".to_string()).into());
        }
        let scheduler = HashScheduler::new(self.hasher.clone());
        let handle = scheduler.start()?;
        self.scheduler = Some(scheduler);
        info!("Background hashing started");
        Ok(handle)
    }

    pub fn stop_hashing(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
    }

    /// Handle for requesting an extra sweep, if hashing is running.
    pub fn sweep_trigger(&self) -> Option<SweepTrigger> {
        self.scheduler.as_ref().map(HashScheduler::trigger_handle)
    }

    // --- Ingestion ---

    pub fn scan_directory(&self, root: &Path, actor: &Actor) -> Result<ScanSummary> {
        self.scanner.scan(root, actor)
    }

    pub fn rescan_all(&self, actor: &Actor) -> Result<ScanSummary> {
        self.scanner.rescan_all(actor)
    }

    pub fn register_directory(&self, path: &Path, actor: &Actor) -> Result<Directory> {
        self.scanner.register_directory(path, actor)
    }

    pub fn list_directories(&self) -> Result<Vec<Directory>> {
        self.scanner.list_directories()
    }

    pub fn remove_directory(&self, id: &str, actor: &Actor) -> Result<()> {
        self.scanner.remove_directory(id, actor)
    }

    pub fn prepare_upload(
        &self,
        original_filename: &str,
        directory_id: Option<&str>,
    ) -> Result<PreparedUpload> {
        self.uploads.prepare(original_filename, directory_id)
    }

    pub fn register_upload(
        &self,
        stored_path: &Path,
        original_filename: &str,
        directory_id: Option<&str>,
        actor: &Actor,
    ) -> Result<Entry> {
        self.uploads
            .register_upload(stored_path, original_filename, directory_id, actor)
    }

    pub fn entry(&self, id: &str) -> Result<Option<Entry>> {
        Ok(entry_repo::find_by_id(&self.db, id)?)
    }

    // --- Hashing ---

    pub fn compute_hashes_now(&self, entry_id: &str) -> Result<HashStatus> {
        self.hasher.compute_hashes_now(entry_id)
    }

    /// Runs one sweep on the caller's runtime, outside the scheduler.
    pub async fn sweep_once(&self) -> Result<SweepStats> {
        self.hasher.sweep(&AtomicBool::new(false)).await
    }

    // --- Integrity ---

    pub fn submit_report(
        &self,
        entry_id: &str,
        actor: &Actor,
        reason: &str,
        description: &str,
    ) -> Result<String> {
        self.integrity
            .submit_report(entry_id, actor, reason, description)
    }

    pub fn list_corrupt_entries(&self) -> Result<Vec<CorruptEntry>> {
        self.integrity.list_corrupt_entries()
    }

    pub fn mark_entry_valid(&self, entry_id: &str, actor: &Actor) -> Result<()> {
        self.integrity.mark_entry_valid(entry_id, actor)
    }

    pub fn clear_all_corrupt_flags(&self, actor: &Actor) -> Result<u64> {
        self.integrity.clear_all_corrupt_flags(actor)
    }

    pub fn resolve_report(&self, report_id: &str, actor: &Actor) -> Result<Report> {
        self.integrity.resolve_report(report_id, actor)
    }

    // --- Activity ---

    pub fn recent_activity(&self, limit: u64) -> Result<Vec<ActivityRow>> {
        Ok(self.activity.recent(limit)?)
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.stop_hashing();
    }
}
