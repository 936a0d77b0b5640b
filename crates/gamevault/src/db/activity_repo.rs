//! Activity log repository: write-once audit trail.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// A raw activity log row.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRow {
    pub id: i64,
    pub event_type: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub target_id: Option<String>,
    /// JSON object with event-specific details.
    pub details: String,
    pub ip_address: Option<String>,
    pub timestamp: String,
}

impl ActivityRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            event_type: row.get("event_type")?,
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            target_id: row.get("target_id")?,
            details: row.get("details")?,
            ip_address: row.get("ip_address")?,
            timestamp: row.get("timestamp")?,
        })
    }
}

/// Appends an activity row. The `id` field is ignored; the assigned id is returned.
pub fn insert(db: &Database, row: &ActivityRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO activity_log (event_type, user_id, username, target_id, details,
             ip_address, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.event_type,
                row.user_id,
                row.username,
                row.target_id,
                row.details,
                row.ip_address,
                row.timestamp,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Most recent activity first.
pub fn list_recent(db: &Database, limit: u64) -> Result<Vec<ActivityRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM activity_log ORDER BY timestamp DESC, id DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], ActivityRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Activity recorded against a single target (entry, report or directory id).
pub fn list_for_target(db: &Database, target_id: &str) -> Result<Vec<ActivityRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM activity_log WHERE target_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![target_id], ActivityRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event_type: &str, target: &str, ts: &str) -> ActivityRow {
        ActivityRow {
            id: 0,
            event_type: event_type.to_string(),
            user_id: Some("u1".to_string()),
            username: Some("alice".to_string()),
            target_id: Some(target.to_string()),
            details: "{}".to_string(),
            ip_address: Some("203.0.113.7".to_string()),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_insert_and_list_recent() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample("report_submitted", "e1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("entry_marked_valid", "e1", "2026-01-02T00:00:00+00:00")).unwrap();

        let rows = list_recent(&db, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_type, "entry_marked_valid");

        let limited = list_recent(&db, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_list_for_target() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample("report_submitted", "e1", "2026-01-01T00:00:00+00:00")).unwrap();
        insert(&db, &sample("report_submitted", "e2", "2026-01-01T00:00:00+00:00")).unwrap();

        let rows = list_for_target(&db, "e1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ip_address.as_deref(), Some("203.0.113.7"));
    }
}
