//! Report repository: integrity reports filed against entries.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use super::entry_repo::parse_timestamp;
use super::{Database, DatabaseError};
use crate::model::{Report, ReportReason, ReportStatus};

fn decode_err(idx: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(DatabaseError::Decode {
            table: "reports",
            reason,
        }),
    )
}

fn from_row(row: &Row<'_>) -> Result<Report, rusqlite::Error> {
    let reason_idx = row.as_ref().column_index("reason")?;
    let reason_raw: String = row.get(reason_idx)?;
    let reason: ReportReason = reason_raw
        .parse()
        .map_err(|e: crate::error::IntegrityError| decode_err(reason_idx, e.to_string()))?;

    let status_idx = row.as_ref().column_index("status")?;
    let status_raw: String = row.get(status_idx)?;
    let status = ReportStatus::parse(&status_raw)
        .ok_or_else(|| decode_err(status_idx, format!("unknown status '{}'", status_raw)))?;

    let created_idx = row.as_ref().column_index("created_at")?;
    let created_raw: String = row.get(created_idx)?;
    let created_at = parse_timestamp(&created_raw).map_err(|e| decode_err(created_idx, e))?;

    let resolved_idx = row.as_ref().column_index("resolved_at")?;
    let resolved_raw: Option<String> = row.get(resolved_idx)?;
    let resolved_at = resolved_raw
        .map(|r| parse_timestamp(&r).map_err(|e| decode_err(resolved_idx, e)))
        .transpose()?;

    Ok(Report {
        id: row.get("id")?,
        entry_id: row.get("entry_id")?,
        entry_name: row.get("entry_name")?,
        reporter_id: row.get("reporter_id")?,
        reporter_name: row.get("reporter_name")?,
        reason,
        description: row.get("description")?,
        status,
        created_at,
        resolved_at,
        resolved_by: row.get("resolved_by")?,
    })
}

/// Inserts a new report row.
pub fn insert(db: &Database, report: &Report) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO reports (id, entry_id, entry_name, reporter_id, reporter_name, reason,
             description, status, created_at, resolved_at, resolved_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                report.id,
                report.entry_id,
                report.entry_name,
                report.reporter_id,
                report.reporter_name,
                report.reason.as_str(),
                report.description,
                report.status.as_str(),
                report.created_at.to_rfc3339(),
                report.resolved_at.map(|t| t.to_rfc3339()),
                report.resolved_by,
            ],
        )?;
        Ok(())
    })
}

/// Finds a report by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Report>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM reports WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Open reports for an entry, oldest first.
pub fn list_open_for_entry(db: &Database, entry_id: &str) -> Result<Vec<Report>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM reports WHERE entry_id = ?1 AND status = 'open' ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![entry_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Every report for an entry regardless of status, newest first.
pub fn list_for_entry(db: &Database, entry_id: &str) -> Result<Vec<Report>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM reports WHERE entry_id = ?1 ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map(params![entry_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts open reports for an entry. Zero when there are none.
pub fn count_open_for_entry(db: &Database, entry_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE entry_id = ?1 AND status = 'open'",
            params![entry_id],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    })
}

/// Marks a report resolved. Returns `false` if no report has this ID.
pub fn resolve(
    db: &Database,
    id: &str,
    resolved_by: &str,
    resolved_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE reports SET status = 'resolved', resolved_at = ?2, resolved_by = ?3
             WHERE id = ?1",
            params![id, resolved_at.to_rfc3339(), resolved_by],
        )?;
        Ok(changed > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_report(id: &str, entry_id: &str) -> Report {
        Report {
            id: id.to_string(),
            entry_id: entry_id.to_string(),
            entry_name: "Zelda".to_string(),
            reporter_id: "u1".to_string(),
            reporter_name: "alice".to_string(),
            reason: ReportReason::CorruptFile,
            description: "crashes on boot".to_string(),
            status: ReportStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_report("r1", "e1")).unwrap();

        let found = find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(found.entry_id, "e1");
        assert_eq!(found.reason, ReportReason::CorruptFile);
        assert_eq!(found.status, ReportStatus::Open);
        assert!(found.resolved_at.is_none());
    }

    #[test]
    fn test_count_open_is_zero_for_no_rows() {
        let db = test_db();
        assert_eq!(count_open_for_entry(&db, "nobody").unwrap(), 0);
    }

    #[test]
    fn test_count_and_list_open() {
        let db = test_db();
        insert(&db, &sample_report("r1", "e1")).unwrap();
        insert(&db, &sample_report("r2", "e1")).unwrap();
        insert(&db, &sample_report("r3", "e2")).unwrap();

        assert_eq!(count_open_for_entry(&db, "e1").unwrap(), 2);
        assert_eq!(list_open_for_entry(&db, "e1").unwrap().len(), 2);

        resolve(&db, "r1", "mod", Utc::now()).unwrap();
        assert_eq!(count_open_for_entry(&db, "e1").unwrap(), 1);
        assert_eq!(list_open_for_entry(&db, "e1").unwrap()[0].id, "r2");
        assert_eq!(list_for_entry(&db, "e1").unwrap().len(), 2);
    }

    #[test]
    fn test_resolve() {
        let db = test_db();
        insert(&db, &sample_report("r1", "e1")).unwrap();

        assert!(resolve(&db, "r1", "moderator", Utc::now()).unwrap());
        let found = find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(found.status, ReportStatus::Resolved);
        assert_eq!(found.resolved_by.as_deref(), Some("moderator"));
        assert!(found.resolved_at.is_some());

        assert!(!resolve(&db, "missing", "moderator", Utc::now()).unwrap());
    }
}
