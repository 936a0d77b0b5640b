//! Corruption reports and the moderation queue built from them.
//!
//! The corrupt flag on an entry and the status of its reports move
//! independently: submitting a report sets the flag, but clearing the flag
//! leaves reports alone and resolving a report leaves the flag alone.

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::activity::{ActivityKind, ActivityLog, Actor};
use crate::db::entry_repo::{self, EntryFilter, EntryPatch};
use crate::db::{report_repo, Database};
use crate::error::{IntegrityError, Result};
use crate::model::{Entry, Report, ReportReason, ReportStatus};

/// Longest accepted report description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A corrupt entry together with its open reports.
#[derive(Debug, Clone, Serialize)]
pub struct CorruptEntry {
    pub entry: Entry,
    pub open_reports: Vec<Report>,
    pub open_report_count: u64,
}

/// Records reports and applies moderator decisions.
pub struct IntegrityTracker {
    db: Database,
    activity: ActivityLog,
}

impl IntegrityTracker {
    pub fn new(db: Database) -> Self {
        Self {
            activity: ActivityLog::new(db.clone()),
            db,
        }
    }

    /// Files a report against an entry and marks the entry corrupt.
    ///
    /// Input is validated before anything is written. Returns the new
    /// report's ID.
    pub fn submit_report(
        &self,
        entry_id: &str,
        reporter: &Actor,
        reason: &str,
        description: &str,
    ) -> Result<String> {
        let reason: ReportReason = reason.parse()?;
        let description = validate_description(reason, description)?;
        let entry = entry_repo::find_by_id(&self.db, entry_id)?
            .ok_or_else(|| IntegrityError::EntryNotFound(entry_id.to_string()))?;

        let report = Report {
            id: uuid::Uuid::new_v4().to_string(),
            entry_id: entry.id.clone(),
            entry_name: entry.name.clone(),
            reporter_id: reporter.user_id.clone(),
            reporter_name: reporter.username.clone(),
            reason,
            description,
            status: ReportStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };
        report_repo::insert(&self.db, &report)?;

        // Always set, however many reports are already open.
        if !entry_repo::update(&self.db, &entry.id, &EntryPatch::corrupt(true))? {
            warn!(
                "Entry {} vanished before it could be flagged (report {})",
                entry.id, report.id
            );
        }

        info!(
            "Report {} filed against '{}' by {} ({})",
            report.id,
            entry.name,
            reporter.username,
            reason.as_str()
        );
        self.activity.record(
            reporter,
            ActivityKind::ReportSubmitted,
            Some(&entry.id),
            json!({
                "report_id": report.id,
                "entry_name": entry.name,
                "reason": reason.as_str(),
            }),
        );

        Ok(report.id)
    }

    /// The moderation queue: corrupt entries by name, each with its open reports.
    pub fn list_corrupt_entries(&self) -> Result<Vec<CorruptEntry>> {
        let entries = entry_repo::query(&self.db, &EntryFilter::corrupt())?;

        let mut queue = Vec::with_capacity(entries.len());
        for entry in entries {
            let open_reports = report_repo::list_open_for_entry(&self.db, &entry.id)?;
            let open_report_count = open_reports.len() as u64;
            queue.push(CorruptEntry {
                entry,
                open_reports,
                open_report_count,
            });
        }
        Ok(queue)
    }

    /// Clears the corrupt flag on one entry. Reports are not touched.
    pub fn mark_entry_valid(&self, entry_id: &str, actor: &Actor) -> Result<()> {
        let entry = entry_repo::find_by_id(&self.db, entry_id)?
            .ok_or_else(|| IntegrityError::EntryNotFound(entry_id.to_string()))?;

        entry_repo::update(&self.db, &entry.id, &EntryPatch::corrupt(false))?;

        info!("Entry '{}' marked valid by {}", entry.name, actor.username);
        self.activity.record(
            actor,
            ActivityKind::EntryMarkedValid,
            Some(&entry.id),
            json!({ "entry_name": entry.name, "was_corrupt": entry.corrupt }),
        );
        Ok(())
    }

    /// Clears every corrupt flag and returns how many entries changed.
    pub fn clear_all_corrupt_flags(&self, actor: &Actor) -> Result<u64> {
        let cleared = entry_repo::clear_all_corrupt(&self.db)?;

        info!("{} cleared {} corrupt flags", actor.username, cleared);
        self.activity.record(
            actor,
            ActivityKind::CorruptFlagsCleared,
            None,
            json!({ "count": cleared }),
        );
        Ok(cleared)
    }

    /// Resolves one report. The entry's corrupt flag is not touched.
    pub fn resolve_report(&self, report_id: &str, resolver: &Actor) -> Result<Report> {
        let report = report_repo::find_by_id(&self.db, report_id)?
            .ok_or_else(|| IntegrityError::ReportNotFound(report_id.to_string()))?;

        if report.status == ReportStatus::Resolved {
            return Ok(report);
        }

        let resolved_at = Utc::now();
        report_repo::resolve(&self.db, &report.id, &resolver.username, resolved_at)?;

        self.activity.record(
            resolver,
            ActivityKind::ReportResolved,
            Some(&report.entry_id),
            json!({ "report_id": report.id, "entry_name": report.entry_name }),
        );

        Ok(Report {
            status: ReportStatus::Resolved,
            resolved_at: Some(resolved_at),
            resolved_by: Some(resolver.username.clone()),
            ..report
        })
    }

    /// Every report filed against an entry, oldest first.
    pub fn reports_for_entry(&self, entry_id: &str) -> Result<Vec<Report>> {
        Ok(report_repo::list_for_entry(&self.db, entry_id)?)
    }
}

fn validate_description(reason: ReportReason, description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(IntegrityError::InvalidDescription(format!(
            "must be at most {} characters",
            MAX_DESCRIPTION_LEN
        ))
        .into());
    }
    if reason == ReportReason::Other && trimmed.is_empty() {
        return Err(IntegrityError::InvalidDescription(
            "required when the reason is 'other'".to_string(),
        )
        .into());
    }
    Ok(trimmed.to_string())
}
