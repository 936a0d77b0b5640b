//! Digest sweeps over entries that have no digests yet.
//!
//! Every entry goes through claim, compute and persist. The claim is written
//! before any bytes are read, so an entry left `Claimed` by a sweep that
//! died is picked up again by the next one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::HashingConfig;
use crate::db::entry_repo::{self, EntryFilter, EntryPatch};
use crate::db::Database;
use crate::error::{HashError, Result};
use crate::hashing::digest::compute_digests;
use crate::model::{DigestState, Entry, EntryKind, FileDigests};
use crate::sanitize::redact_path;

/// Claims younger than this are treated as in flight by on-demand requests.
pub const CLAIM_LEASE: Duration = Duration::from_secs(60 * 60);

/// Counts for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub hashed: u64,
    /// Claims dropped because the backing file vanished.
    pub released: u64,
    /// Entries skipped because the backing file is missing.
    pub skipped: u64,
    pub failed: u64,
}

/// Answer to an on-demand hash request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HashStatus {
    Cached(FileDigests),
    Processing,
}

enum Outcome {
    Hashed,
    Released,
    Skipped,
}

/// Runs claim/compute/persist over pending entries.
#[derive(Clone)]
pub struct HashWorker {
    db: Database,
    config: HashingConfig,
}

impl HashWorker {
    pub fn new(db: Database, config: HashingConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &HashingConfig {
        &self.config
    }

    /// Entries a sweep would visit, in visiting order.
    pub fn select_pending(&self) -> Result<Vec<Entry>> {
        Ok(entry_repo::query(&self.db, &EntryFilter::pending_hashes())?)
    }

    /// One pass over every pending entry, one at a time.
    ///
    /// `stop` is checked between entries; the entry being hashed always
    /// finishes. Per-entry failures are logged and counted.
    pub async fn sweep(&self, stop: &AtomicBool) -> Result<SweepStats> {
        let pending = self.select_pending()?;
        let mut stats = SweepStats::default();

        if pending.is_empty() {
            debug!("Hash sweep: nothing pending");
            return Ok(stats);
        }
        info!("Hash sweep: {} entries pending", pending.len());

        let entry_delay = self.config.entry_delay();
        for (i, entry) in pending.iter().enumerate() {
            if stop.load(Ordering::Acquire) {
                info!("Hash sweep stopped after {} of {} entries", i, pending.len());
                break;
            }
            if i > 0 && !entry_delay.is_zero() {
                tokio::time::sleep(entry_delay).await;
            }

            match self.process_entry(entry).await {
                Ok(Outcome::Hashed) => stats.hashed += 1,
                Ok(Outcome::Released) => stats.released += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    error!("Hashing entry {} failed: {}", entry.id, e);
                    release_claim(&self.db, &entry.id);
                    stats.failed += 1;
                }
            }
        }

        info!(
            "Hash sweep done: {} hashed, {} released, {} skipped, {} failed",
            stats.hashed, stats.released, stats.skipped, stats.failed
        );
        Ok(stats)
    }

    async fn process_entry(&self, entry: &Entry) -> Result<Outcome> {
        let path = PathBuf::from(&entry.source);
        if !path.is_file() {
            return Ok(vanished(&self.db, entry, &path));
        }

        claim(&self.db, &entry.id)?;

        let chunk_size = self.config.chunk_size;
        let task_path = path.clone();
        let digests = tokio::task::spawn_blocking(move || compute_digests(&task_path, chunk_size))
            .await
            .map_err(|e| HashError::TaskFailed(e.to_string()))??;

        persist(&self.db, &entry.id, digests)?;
        debug!("Hashed {}", redact_path(&path));
        Ok(Outcome::Hashed)
    }

    /// Digests for one entry, computed in the background if not cached.
    ///
    /// Returns `Processing` right after claiming the entry; the digests
    /// land in the store once the background thread finishes. A claim
    /// younger than [`CLAIM_LEASE`] is left alone.
    pub fn compute_hashes_now(&self, entry_id: &str) -> Result<HashStatus> {
        let entry = entry_repo::find_by_id(&self.db, entry_id)?
            .ok_or_else(|| HashError::EntryNotFound(entry_id.to_string()))?;

        if entry.kind != EntryKind::Filepath {
            return Err(HashError::NotAFile(entry.id).into());
        }
        if let Some(digests) = entry.digest.digests() {
            return Ok(HashStatus::Cached(digests));
        }
        if let Some(age) = entry.digest.claim_age(Utc::now()) {
            if age.to_std().map(|a| a < CLAIM_LEASE).unwrap_or(true) {
                return Ok(HashStatus::Processing);
            }
            warn!("Re-claiming stale entry {}", entry.id);
        }

        let path = PathBuf::from(&entry.source);
        if !path.is_file() {
            vanished(&self.db, &entry, &path);
            return Err(HashError::SourceMissing(path).into());
        }

        claim(&self.db, &entry.id)?;

        let db = self.db.clone();
        let id = entry.id.clone();
        let chunk_size = self.config.chunk_size;
        let spawned = std::thread::Builder::new()
            .name("hash-on-demand".to_string())
            .spawn(move || {
                let result = compute_digests(&path, chunk_size)
                    .map_err(Into::into)
                    .and_then(|digests| persist(&db, &id, digests));
                match result {
                    Ok(()) => info!("On-demand hash finished for {}", id),
                    Err(e) => {
                        error!("On-demand hash for {} failed: {}", id, e);
                        release_claim(&db, &id);
                    }
                }
            });

        if let Err(e) = spawned {
            release_claim(&self.db, &entry.id);
            return Err(HashError::TaskFailed(e.to_string()).into());
        }

        Ok(HashStatus::Processing)
    }
}

fn claim(db: &Database, id: &str) -> Result<()> {
    let state = DigestState::Claimed { since: Utc::now() };
    if !entry_repo::update(db, id, &EntryPatch::digest(state))? {
        return Err(HashError::EntryNotFound(id.to_string()).into());
    }
    Ok(())
}

fn persist(db: &Database, id: &str, digests: FileDigests) -> Result<()> {
    if !entry_repo::update(db, id, &EntryPatch::digest(digests.into()))? {
        return Err(HashError::EntryNotFound(id.to_string()).into());
    }
    Ok(())
}

/// Best effort. A failure here is logged and otherwise ignored.
fn release_claim(db: &Database, id: &str) {
    if let Err(e) = entry_repo::update(db, id, &EntryPatch::digest(DigestState::Unclaimed)) {
        warn!("Failed to release claim on {}: {}", id, e);
    }
}

fn vanished(db: &Database, entry: &Entry, path: &Path) -> Outcome {
    if entry.digest.is_claimed() {
        warn!(
            "Source of {} is gone ({}), releasing claim",
            entry.id,
            redact_path(path)
        );
        release_claim(db, &entry.id);
        Outcome::Released
    } else {
        debug!("Source of {} is gone, skipping", entry.id);
        Outcome::Skipped
    }
}
