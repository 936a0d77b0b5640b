use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::activity::{ActivityKind, ActivityLog, Actor};
use crate::db::{directory_repo, entry_repo, Database, DatabaseError};
use crate::error::{Result, ScanError};
use crate::model::{Directory, Entry, GameFormat};

/// Default number of directory levels walked below a scan root.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Counts returned by a scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// New entries registered.
    pub added: u64,
    /// Candidates already registered under the same source.
    pub skipped: u64,
    /// Candidates that could not be registered (stat or store failure).
    pub failed: u64,
}

impl std::ops::AddAssign for ScanSummary {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

enum Registration {
    Added,
    Skipped,
}

/// Discovers game files under registered roots and records them as entries.
///
/// Only registers files; digests are left to the hash worker.
pub struct DirectoryScanner {
    db: Database,
    activity: ActivityLog,
    max_depth: usize,
}

impl DirectoryScanner {
    pub fn new(db: Database, max_depth: usize) -> Self {
        Self {
            activity: ActivityLog::new(db.clone()),
            db,
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Walks `root` to the configured depth and registers every unseen game file.
    pub fn scan(&self, root: &Path, actor: &Actor) -> Result<ScanSummary> {
        self.scan_to_depth(root, actor, self.max_depth)
    }

    /// Like [`scan`](Self::scan) with an explicit depth bound.
    ///
    /// Per-file problems are logged and counted, never returned.
    pub fn scan_to_depth(
        &self,
        root: &Path,
        actor: &Actor,
        max_depth: usize,
    ) -> Result<ScanSummary> {
        if !root.is_dir() {
            return Err(ScanError::InvalidRoot(root.to_path_buf()).into());
        }
        let root = normalize_root(root);

        let mut summary = ScanSummary::default();

        for item in WalkDir::new(&root).min_depth(1).max_depth(max_depth.max(1)) {
            let dir_entry = match item {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable path during scan: {}", e);
                    continue;
                }
            };

            let path = dir_entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(format) = GameFormat::from_path(path) else {
                continue;
            };

            match self.register_file(path, format, actor) {
                Ok(Registration::Added) => summary.added += 1,
                Ok(Registration::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!("Failed to register {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Scanned {}: {} added, {} skipped, {} failed",
            root.display(),
            summary.added,
            summary.skipped,
            summary.failed
        );

        self.activity.record(
            actor,
            ActivityKind::DirectoryScan,
            None,
            json!({
                "path": root.to_string_lossy(),
                "added": summary.added,
                "skipped": summary.skipped,
                "failed": summary.failed,
            }),
        );

        Ok(summary)
    }

    /// Scans every registered directory and sums the results.
    ///
    /// Directories that no longer exist on disk are skipped.
    pub fn rescan_all(&self, actor: &Actor) -> Result<ScanSummary> {
        let mut total = ScanSummary::default();

        for directory in directory_repo::list(&self.db)? {
            let path = Path::new(&directory.path);
            if !path.is_dir() {
                warn!("Registered directory missing, skipping: {}", directory.path);
                continue;
            }
            match self.scan(path, actor) {
                Ok(summary) => total += summary,
                Err(e) => warn!("Rescan of {} failed: {}", directory.path, e),
            }
        }

        Ok(total)
    }

    fn register_file(
        &self,
        path: &Path,
        format: GameFormat,
        actor: &Actor,
    ) -> Result<Registration> {
        let source = path
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Path(path.to_path_buf()))?;

        if entry_repo::find_by_source(&self.db, source)?.is_some() {
            debug!("Already registered: {}", source);
            return Ok(Registration::Skipped);
        }

        let metadata = std::fs::metadata(path).map_err(|e| ScanError::Metadata {
            path: path.to_path_buf(),
            source: e,
        })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string());

        let mut entry = Entry::new_file(name, source, format, metadata.len(), &actor.username);
        entry.file_created_at = metadata.created().ok().map(DateTime::<Utc>::from);
        entry.file_modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);

        match entry_repo::insert(&self.db, &entry) {
            Ok(()) => {
                debug!("Registered {} as {}", source, entry.id);
                Ok(Registration::Added)
            }
            // Registered concurrently between the lookup and the insert.
            Err(DatabaseError::Duplicate { .. }) => Ok(Registration::Skipped),
            Err(e) => Err(e.into()),
        }
    }

    /// Registers a scan root. Registering the same path twice is a no-op.
    pub fn register_directory(&self, path: &Path, actor: &Actor) -> Result<Directory> {
        if !path.is_dir() {
            return Err(ScanError::InvalidRoot(path.to_path_buf()).into());
        }
        let path = normalize_root(path);
        let path_str = path
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Path(path.clone()))?;

        let directory = directory_repo::insert(&self.db, path_str)?;
        self.activity.record(
            actor,
            ActivityKind::DirectoryAdded,
            Some(&directory.id),
            json!({ "path": directory.path }),
        );
        Ok(directory)
    }

    pub fn list_directories(&self) -> Result<Vec<Directory>> {
        Ok(directory_repo::list(&self.db)?)
    }

    /// Unregisters a scan root. Entries found under it are kept.
    pub fn remove_directory(&self, id: &str, actor: &Actor) -> Result<()> {
        let directory = directory_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| ScanError::DirectoryNotFound(id.to_string()))?;
        directory_repo::delete(&self.db, id)?;
        self.activity.record(
            actor,
            ActivityKind::DirectoryRemoved,
            Some(id),
            json!({ "path": directory.path }),
        );
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` folded away lexically, so
/// every spelling of a directory yields the same entry sources.
fn normalize_root(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
