//! Entry repository: CRUD operations for the `entries` table.

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::model::{DigestState, Entry, EntryKind, GameFormat, Md5Digest, Sha256Digest};

/// Partial update of an entry. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub size: Option<u64>,
    pub corrupt: Option<bool>,
    pub digest: Option<DigestState>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl EntryPatch {
    pub fn corrupt(flag: bool) -> Self {
        Self {
            corrupt: Some(flag),
            ..Default::default()
        }
    }

    pub fn digest(state: DigestState) -> Self {
        Self {
            digest: Some(state),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.size.is_none()
            && self.corrupt.is_none()
            && self.digest.is_none()
            && self.metadata.is_none()
    }
}

/// Result ordering for [`query`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EntrySort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    NameAsc,
}

/// Query filter parameters for entry listing.
#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub corrupt: Option<bool>,
    /// Only entries whose digests are missing or claimed.
    pub needs_hashing: bool,
    pub sort: EntrySort,
    pub limit: Option<u64>,
}

impl EntryFilter {
    /// File entries the hash worker has to visit, oldest first by creation.
    pub fn pending_hashes() -> Self {
        Self {
            kind: Some(EntryKind::Filepath),
            needs_hashing: true,
            sort: EntrySort::CreatedAsc,
            ..Default::default()
        }
    }

    pub fn corrupt() -> Self {
        Self {
            corrupt: Some(true),
            sort: EntrySort::NameAsc,
            ..Default::default()
        }
    }
}

fn decode_err(idx: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(DatabaseError::Decode {
            table: "entries",
            reason,
        }),
    )
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

fn get_timestamp(row: &Row<'_>, col: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    let idx = row.as_ref().column_index(col)?;
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| decode_err(idx, e))
}

fn get_opt_timestamp(row: &Row<'_>, col: &str) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let idx = row.as_ref().column_index(col)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_timestamp(&r).map_err(|e| decode_err(idx, e)))
        .transpose()
}

fn digest_from_row(row: &Row<'_>) -> Result<DigestState, rusqlite::Error> {
    let idx = row.as_ref().column_index("digest_state")?;
    let state: String = row.get(idx)?;
    match state.as_str() {
        "unclaimed" => Ok(DigestState::Unclaimed),
        "claimed" => Ok(DigestState::Claimed {
            since: get_timestamp(row, "claimed_at")?,
        }),
        "hashed" => {
            let md5: String = row.get("md5")?;
            let sha256: String = row.get("sha256")?;
            Ok(DigestState::Hashed {
                md5: Md5Digest::parse(&md5).map_err(|e| decode_err(idx, e.to_string()))?,
                sha256: Sha256Digest::parse(&sha256)
                    .map_err(|e| decode_err(idx, e.to_string()))?,
            })
        }
        other => Err(decode_err(idx, format!("unknown digest state '{}'", other))),
    }
}

/// Column values for a digest state: (state, claimed_at, md5, sha256).
fn digest_columns(
    state: &DigestState,
) -> (&'static str, Option<String>, Option<String>, Option<String>) {
    match state {
        DigestState::Unclaimed => ("unclaimed", None, None, None),
        DigestState::Claimed { since } => ("claimed", Some(since.to_rfc3339()), None, None),
        DigestState::Hashed { md5, sha256 } => (
            "hashed",
            None,
            Some(md5.as_str().to_string()),
            Some(sha256.as_str().to_string()),
        ),
    }
}

fn from_row(row: &Row<'_>) -> Result<Entry, rusqlite::Error> {
    let kind_idx = row.as_ref().column_index("kind")?;
    let kind_raw: String = row.get(kind_idx)?;
    let kind = EntryKind::parse(&kind_raw)
        .ok_or_else(|| decode_err(kind_idx, format!("unknown kind '{}'", kind_raw)))?;

    let format_idx = row.as_ref().column_index("format")?;
    let format_raw: String = row.get(format_idx)?;
    let format = GameFormat::from_extension(&format_raw)
        .ok_or_else(|| decode_err(format_idx, format!("unknown format '{}'", format_raw)))?;

    let meta_idx = row.as_ref().column_index("metadata")?;
    let meta_raw: String = row.get(meta_idx)?;
    let metadata = serde_json::from_str(&meta_raw)
        .map_err(|e| decode_err(meta_idx, format!("invalid metadata: {}", e)))?;

    let size: i64 = row.get("size")?;

    Ok(Entry {
        id: row.get("id")?,
        name: row.get("name")?,
        source: row.get("source")?,
        kind,
        format,
        size: size.max(0) as u64,
        created_by: row.get("created_by")?,
        created_at: get_timestamp(row, "created_at")?,
        file_created_at: get_opt_timestamp(row, "file_created_at")?,
        file_modified_at: get_opt_timestamp(row, "file_modified_at")?,
        metadata,
        corrupt: row.get("corrupt")?,
        digest: digest_from_row(row)?,
    })
}

/// Inserts a new entry. Fails with [`DatabaseError::Duplicate`] if the source is taken.
pub fn insert(db: &Database, entry: &Entry) -> Result<(), DatabaseError> {
    let (state, claimed_at, md5, sha256) = digest_columns(&entry.digest);
    let metadata = serde_json::Value::Object(entry.metadata.clone()).to_string();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO entries (id, name, source, kind, format, size, created_by, created_at,
             file_created_at, file_modified_at, metadata, corrupt, digest_state, claimed_at,
             md5, sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                entry.id,
                entry.name,
                entry.source,
                entry.kind.as_str(),
                entry.format.extension(),
                entry.size as i64,
                entry.created_by,
                entry.created_at.to_rfc3339(),
                entry.file_created_at.map(|t| t.to_rfc3339()),
                entry.file_modified_at.map(|t| t.to_rfc3339()),
                metadata,
                entry.corrupt,
                state,
                claimed_at,
                md5,
                sha256,
            ],
        )
        .map_err(|e| DatabaseError::from_insert(e, "source", &entry.source))?;
        Ok(())
    })
}

fn find_one(db: &Database, sql: &str, value: &str) -> Result<Option<Entry>, DatabaseError> {
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

/// Finds an entry by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Entry>, DatabaseError> {
    find_one(db, "SELECT * FROM entries WHERE id = ?1", id)
}

/// Finds the entry registered for an exact source path or URL.
pub fn find_by_source(db: &Database, source: &str) -> Result<Option<Entry>, DatabaseError> {
    find_one(db, "SELECT * FROM entries WHERE source = ?1", source)
}

/// Finds the first entry with an exact display name.
pub fn find_by_name(db: &Database, name: &str) -> Result<Option<Entry>, DatabaseError> {
    find_one(db, "SELECT * FROM entries WHERE name = ?1 LIMIT 1", name)
}

/// Applies a partial update. Returns `false` if no entry has this ID.
pub fn update(db: &Database, id: &str, patch: &EntryPatch) -> Result<bool, DatabaseError> {
    if patch.is_empty() {
        return Ok(find_by_id(db, id)?.is_some());
    }

    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref name) = patch.name {
        values.push(Box::new(name.clone()));
        sets.push(format!("name = ?{}", values.len()));
    }
    if let Some(size) = patch.size {
        values.push(Box::new(size as i64));
        sets.push(format!("size = ?{}", values.len()));
    }
    if let Some(corrupt) = patch.corrupt {
        values.push(Box::new(corrupt));
        sets.push(format!("corrupt = ?{}", values.len()));
    }
    if let Some(ref metadata) = patch.metadata {
        values.push(Box::new(
            serde_json::Value::Object(metadata.clone()).to_string(),
        ));
        sets.push(format!("metadata = ?{}", values.len()));
    }
    if let Some(ref digest) = patch.digest {
        let (state, claimed_at, md5, sha256) = digest_columns(digest);
        values.push(Box::new(state));
        sets.push(format!("digest_state = ?{}", values.len()));
        values.push(Box::new(claimed_at));
        sets.push(format!("claimed_at = ?{}", values.len()));
        values.push(Box::new(md5));
        sets.push(format!("md5 = ?{}", values.len()));
        values.push(Box::new(sha256));
        sets.push(format!("sha256 = ?{}", values.len()));
    }

    values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE entries SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );

    db.with_conn(|conn| {
        let params_ref: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(&sql, params_ref.as_slice())?;
        Ok(changed > 0)
    })
}

/// Queries entries matching a filter.
pub fn query(db: &Database, filter: &EntryFilter) -> Result<Vec<Entry>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(kind) = filter.kind {
            param_values.push(Box::new(kind.as_str()));
            conditions.push(format!("kind = ?{}", param_values.len()));
        }
        if let Some(corrupt) = filter.corrupt {
            param_values.push(Box::new(corrupt));
            conditions.push(format!("corrupt = ?{}", param_values.len()));
        }
        if filter.needs_hashing {
            conditions.push("digest_state IN ('unclaimed', 'claimed')".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order = match filter.sort {
            EntrySort::CreatedDesc => "created_at DESC",
            EntrySort::CreatedAsc => "created_at ASC",
            EntrySort::NameAsc => "name ASC",
        };

        let limit_clause = match filter.limit {
            Some(limit) => {
                param_values.push(Box::new(limit as i64));
                format!("LIMIT ?{}", param_values.len())
            }
            None => String::new(),
        };

        let sql = format!(
            "SELECT * FROM entries {} ORDER BY {} {}",
            where_clause, order, limit_clause
        );

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes an entry. Returns `false` if it did not exist.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Sets `corrupt = 0` on every corrupt entry, returning how many changed.
pub fn clear_all_corrupt(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("UPDATE entries SET corrupt = 0 WHERE corrupt = 1", [])?;
        Ok(changed as u64)
    })
}
