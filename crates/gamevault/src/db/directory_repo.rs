//! Directory repository: registered scan roots.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Row};

use super::entry_repo::parse_timestamp;
use super::{Database, DatabaseError};
use crate::model::Directory;

fn from_row(row: &Row<'_>) -> Result<Directory, rusqlite::Error> {
    let added_idx = row.as_ref().column_index("added_at")?;
    let added_raw: String = row.get(added_idx)?;
    let added_at = parse_timestamp(&added_raw).map_err(|reason| {
        rusqlite::Error::FromSqlConversionFailure(
            added_idx,
            Type::Text,
            Box::new(DatabaseError::Decode {
                table: "directories",
                reason,
            }),
        )
    })?;

    Ok(Directory {
        id: row.get("id")?,
        path: row.get("path")?,
        added_at,
    })
}

fn find_one(db: &Database, sql: &str, value: &str) -> Result<Option<Directory>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![value], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Registers a path. If it is already registered the existing row is returned.
pub fn insert(db: &Database, path: &str) -> Result<Directory, DatabaseError> {
    if let Some(existing) = find_by_path(db, path)? {
        log::warn!("Directory already registered: {}", path);
        return Ok(existing);
    }

    let directory = Directory {
        id: uuid::Uuid::new_v4().to_string(),
        path: path.to_string(),
        added_at: Utc::now(),
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO directories (id, path, added_at) VALUES (?1, ?2, ?3)",
            params![directory.id, directory.path, directory.added_at.to_rfc3339()],
        )
        .map_err(|e| DatabaseError::from_insert(e, "path", path))?;
        Ok(())
    })?;

    Ok(directory)
}

pub fn find_by_path(db: &Database, path: &str) -> Result<Option<Directory>, DatabaseError> {
    find_one(db, "SELECT * FROM directories WHERE path = ?1", path)
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Directory>, DatabaseError> {
    find_one(db, "SELECT * FROM directories WHERE id = ?1", id)
}

/// All registered directories, newest first.
pub fn list(db: &Database) -> Result<Vec<Directory>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM directories ORDER BY added_at DESC")?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM directories WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
