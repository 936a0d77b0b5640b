//! Audit trail of who did what, from where.
//!
//! Recording is best effort: a failed write is logged and never fails the
//! operation that triggered it.

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::db::activity_repo::{self, ActivityRow};
use crate::db::{Database, DatabaseError};

/// The user behind a request, plus the address the request came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub username: String,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Identity used for work the process does on its own behalf.
    pub fn system() -> Self {
        Self::new("system", "system")
    }
}

/// Kinds of recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    DirectoryScan,
    DirectoryAdded,
    DirectoryRemoved,
    Upload,
    ReportSubmitted,
    ReportResolved,
    EntryMarkedValid,
    CorruptFlagsCleared,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::DirectoryScan => "directory_scan",
            ActivityKind::DirectoryAdded => "directory_added",
            ActivityKind::DirectoryRemoved => "directory_removed",
            ActivityKind::Upload => "upload",
            ActivityKind::ReportSubmitted => "report_submitted",
            ActivityKind::ReportResolved => "report_resolved",
            ActivityKind::EntryMarkedValid => "entry_marked_valid",
            ActivityKind::CorruptFlagsCleared => "corrupt_flags_cleared",
        }
    }
}

/// Resolves the originating client address.
///
/// Prefers the Cloudflare header, then the first hop of `X-Forwarded-For`,
/// then the direct peer.
pub fn client_ip(
    cf_connecting_ip: Option<&str>,
    x_forwarded_for: Option<&str>,
    peer: Option<&str>,
) -> String {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    cf_connecting_ip
        .and_then(non_empty)
        .or_else(|| {
            x_forwarded_for
                .and_then(|v| v.split(',').next())
                .and_then(non_empty)
        })
        .or_else(|| peer.and_then(non_empty))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Writes activity rows for the operations of this crate.
#[derive(Clone)]
pub struct ActivityLog {
    db: Database,
}

impl ActivityLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records an event. Failures are logged and swallowed.
    pub fn record(
        &self,
        actor: &Actor,
        kind: ActivityKind,
        target_id: Option<&str>,
        details: serde_json::Value,
    ) {
        let row = ActivityRow {
            id: 0,
            event_type: kind.as_str().to_string(),
            user_id: Some(actor.user_id.clone()),
            username: Some(actor.username.clone()),
            target_id: target_id.map(str::to_string),
            details: details.to_string(),
            ip_address: actor.ip_address.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };

        if let Err(e) = activity_repo::insert(&self.db, &row) {
            warn!(
                "Failed to record {} activity for '{}': {}",
                kind.as_str(),
                actor.username,
                e
            );
        }
    }

    pub fn recent(&self, limit: u64) -> Result<Vec<ActivityRow>, DatabaseError> {
        activity_repo::list_recent(&self.db, limit)
    }

    pub fn for_target(&self, target_id: &str) -> Result<Vec<ActivityRow>, DatabaseError> {
        activity_repo::list_for_target(&self.db, target_id)
    }
}
