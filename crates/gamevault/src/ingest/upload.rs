use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::json;

use crate::activity::{ActivityKind, ActivityLog, Actor};
use crate::db::{directory_repo, entry_repo, Database, DatabaseError};
use crate::error::{Result, ScanError, UploadError};
use crate::model::{Entry, GameFormat};
use crate::sanitize::{is_direct_child, redact_path, sanitize_name, unique_destination};

/// A validated upload name and the place its bytes should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    pub name: String,
    pub format: GameFormat,
    pub destination: PathBuf,
}

/// Turns files written by an upload transport into entries.
pub struct UploadRegistrar {
    db: Database,
    activity: ActivityLog,
    upload_dir: PathBuf,
}

impl UploadRegistrar {
    pub fn new(db: Database, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            activity: ActivityLog::new(db.clone()),
            db,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Validates `original_filename` and picks a free destination for it.
    ///
    /// Uploads go to the registered directory `directory_id` when given,
    /// otherwise to the default upload directory, which is created on
    /// first use. A name with nothing usable left after sanitizing gets
    /// a generated `upload_<hex>` name instead.
    pub fn prepare(
        &self,
        original_filename: &str,
        directory_id: Option<&str>,
    ) -> Result<PreparedUpload> {
        let (sanitized, format) = parse_filename(original_filename)?;
        let name = self.claim_name(sanitized.unwrap_or_else(generated_name))?;

        let target = self.target_dir(directory_id)?;
        if directory_id.is_none() {
            std::fs::create_dir_all(&target).map_err(|e| UploadError::CreateDir {
                path: target.clone(),
                source: e,
            })?;
        }
        if !target.is_dir() {
            return Err(ScanError::InvalidRoot(target).into());
        }

        let destination = unique_destination(&target, &name, format.extension())
            .ok_or_else(|| UploadError::PathTraversal(target.join(&name)))?;

        Ok(PreparedUpload {
            name,
            format,
            destination,
        })
    }

    /// Registers a file already written to `stored_path`.
    pub fn register_upload(
        &self,
        stored_path: &Path,
        original_filename: &str,
        directory_id: Option<&str>,
        actor: &Actor,
    ) -> Result<Entry> {
        let (sanitized, format) = parse_filename(original_filename)?;
        // Generated names live only in the stored file name.
        let name = sanitized
            .or_else(|| {
                stored_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(generated_name);
        let name = self.claim_name(name)?;

        let target = self.target_dir(directory_id)?;
        if !is_direct_child(&target, stored_path) {
            return Err(UploadError::PathTraversal(stored_path.to_path_buf()).into());
        }
        if !stored_path.is_file() {
            return Err(UploadError::MissingFile(stored_path.to_path_buf()).into());
        }

        let source = stored_path
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Path(stored_path.to_path_buf()))?;
        if entry_repo::find_by_source(&self.db, source)?.is_some() {
            return Err(UploadError::DuplicateSource(source.to_string()).into());
        }

        let metadata = std::fs::metadata(stored_path).map_err(|e| UploadError::Metadata {
            path: stored_path.to_path_buf(),
            source: e,
        })?;

        let mut entry = Entry::new_file(&name, source, format, metadata.len(), &actor.username);
        entry.file_created_at = metadata.created().ok().map(DateTime::<Utc>::from);
        entry.file_modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
        entry
            .metadata
            .insert("original_filename".to_string(), json!(original_filename));
        if let Some(id) = directory_id {
            entry.metadata.insert("directory_id".to_string(), json!(id));
        }

        match entry_repo::insert(&self.db, &entry) {
            Ok(()) => {}
            Err(DatabaseError::Duplicate { .. }) => {
                return Err(UploadError::DuplicateSource(source.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Registered upload {} ({} bytes) as {}",
            redact_path(stored_path),
            entry.size,
            entry.id
        );

        self.activity.record(
            actor,
            ActivityKind::Upload,
            Some(&entry.id),
            json!({
                "filename": name,
                "format": format.extension(),
                "size": entry.size,
                "directory_id": directory_id,
            }),
        );

        Ok(entry)
    }

    fn claim_name(&self, name: String) -> Result<String> {
        if entry_repo::find_by_name(&self.db, &name)?.is_some() {
            warn!("Upload rejected, name already taken: {}", name);
            return Err(UploadError::DuplicateName(name).into());
        }
        Ok(name)
    }

    fn target_dir(&self, directory_id: Option<&str>) -> Result<PathBuf> {
        match directory_id {
            Some(id) => {
                let directory = directory_repo::find_by_id(&self.db, id)?
                    .ok_or_else(|| ScanError::DirectoryNotFound(id.to_string()))?;
                Ok(PathBuf::from(directory.path))
            }
            None => Ok(self.upload_dir.clone()),
        }
    }
}

/// Splits an upload filename into its sanitized base name and format.
///
/// The name is `None` when sanitizing leaves nothing usable.
fn parse_filename(original_filename: &str) -> Result<(Option<String>, GameFormat)> {
    let trimmed = original_filename.trim();
    if trimmed.is_empty() {
        return Err(UploadError::MissingFilename.into());
    }

    let (stem, ext) = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext),
        _ => return Err(UploadError::MissingExtension.into()),
    };
    let format = GameFormat::from_extension(ext)
        .ok_or_else(|| UploadError::UnsupportedFormat(ext.to_string()))?;

    Ok((sanitize_name(stem), format))
}

fn generated_name() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("upload_{}", &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::model::DigestState;
    use tempfile::TempDir;

    fn setup() -> (TempDir, UploadRegistrar, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let registrar = UploadRegistrar::new(db.clone(), temp_dir.path());
        (temp_dir, registrar, db)
    }

    fn uploader() -> Actor {
        Actor::new("u1", "alice").with_ip("192.0.2.1")
    }

    #[test]
    fn test_prepare_picks_free_destination() {
        let (temp_dir, registrar, _db) = setup();
        std::fs::write(temp_dir.path().join("Zelda.nsp"), b"taken").unwrap();

        let prepared = registrar.prepare("Zelda.NSP", None).unwrap();
        assert_eq!(prepared.name, "Zelda");
        assert_eq!(prepared.format, GameFormat::Nsp);
        assert_eq!(prepared.destination, temp_dir.path().join("Zelda_1.nsp"));
    }

    #[test]
    fn test_prepare_sanitizes_name() {
        let (temp_dir, registrar, _db) = setup();
        let prepared = registrar.prepare("../../etc/Mario: Odyssey?.xci", None).unwrap();
        assert_eq!(prepared.name, "etcMario Odyssey");
        assert_eq!(
            prepared.destination,
            temp_dir.path().join("etcMario Odyssey.xci")
        );
    }

    #[test]
    fn test_prepare_rejects_bad_names() {
        let (_temp_dir, registrar, _db) = setup();
        assert!(matches!(
            registrar.prepare("   ", None),
            Err(VaultError::Upload(UploadError::MissingFilename))
        ));
        assert!(matches!(
            registrar.prepare("noext", None),
            Err(VaultError::Upload(UploadError::MissingExtension))
        ));
        assert!(matches!(
            registrar.prepare("game.zip", None),
            Err(VaultError::Upload(UploadError::UnsupportedFormat(_)))
        ));
    }

    #[test]
    fn test_prepare_generates_name_when_sanitizing_leaves_nothing() {
        let (temp_dir, registrar, _db) = setup();

        for original in ["***.nsp".to_string(), format!("{}.nsp", "a".repeat(201))] {
            let prepared = registrar.prepare(&original, None).unwrap();
            let hex = prepared.name.strip_prefix("upload_").unwrap();
            assert_eq!(hex.len(), 16);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
            assert_eq!(
                prepared.destination,
                temp_dir.path().join(format!("{}.nsp", prepared.name))
            );
        }
    }

    #[test]
    fn test_register_upload_keeps_generated_name() {
        let (_temp_dir, registrar, _db) = setup();
        let prepared = registrar.prepare("<>.xci", None).unwrap();
        std::fs::write(&prepared.destination, b"x").unwrap();

        let entry = registrar
            .register_upload(&prepared.destination, "<>.xci", None, &uploader())
            .unwrap();
        assert_eq!(entry.name, prepared.name);
        assert_eq!(entry.metadata["original_filename"], "<>.xci");
    }

    #[test]
    fn test_prepare_creates_default_upload_dir() {
        let temp_dir = TempDir::new().unwrap();
        let upload_dir = temp_dir.path().join("fresh").join("uploads");
        let registrar = UploadRegistrar::new(Database::open_in_memory().unwrap(), &upload_dir);

        let prepared = registrar.prepare("Kirby.nsp", None).unwrap();
        assert!(upload_dir.is_dir());
        assert_eq!(prepared.destination, upload_dir.join("Kirby.nsp"));
    }

    #[test]
    fn test_prepare_requires_existing_registered_dir() {
        let (_temp_dir, registrar, db) = setup();
        let library = TempDir::new().unwrap();
        let missing = library.path().join("removed");
        let dir = directory_repo::insert(&db, missing.to_str().unwrap()).unwrap();

        assert!(matches!(
            registrar.prepare("Pikmin.xci", Some(&dir.id)),
            Err(VaultError::Scan(ScanError::InvalidRoot(_)))
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn test_register_upload_creates_unclaimed_entry() {
        let (temp_dir, registrar, db) = setup();
        let stored = temp_dir.path().join("Metroid.nsz");
        std::fs::write(&stored, b"12345").unwrap();

        let entry = registrar
            .register_upload(&stored, "Metroid.nsz", None, &uploader())
            .unwrap();
        assert_eq!(entry.name, "Metroid");
        assert_eq!(entry.format, GameFormat::Nsz);
        assert_eq!(entry.size, 5);
        assert_eq!(entry.created_by, "alice");
        assert_eq!(entry.digest, DigestState::Unclaimed);
        assert_eq!(entry.metadata["original_filename"], "Metroid.nsz");

        let stored_entry = entry_repo::find_by_id(&db, &entry.id).unwrap().unwrap();
        assert_eq!(stored_entry.source, stored.to_str().unwrap());

        let activity = crate::db::activity_repo::list_for_target(&db, &entry.id).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].event_type, "upload");
        assert_eq!(activity[0].ip_address.as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_register_upload_rejects_duplicate_name() {
        let (temp_dir, registrar, _db) = setup();
        let first = temp_dir.path().join("Kirby.nsp");
        let second = temp_dir.path().join("Kirby_1.nsp");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"b").unwrap();

        registrar
            .register_upload(&first, "Kirby.nsp", None, &uploader())
            .unwrap();
        let result = registrar.register_upload(&second, "Kirby.nsp", None, &uploader());
        assert!(matches!(
            result,
            Err(VaultError::Upload(UploadError::DuplicateName(name))) if name == "Kirby"
        ));
    }

    #[test]
    fn test_register_upload_rejects_duplicate_source() {
        let (temp_dir, registrar, _db) = setup();
        let stored = temp_dir.path().join("Kirby.nsp");
        std::fs::write(&stored, b"a").unwrap();

        registrar
            .register_upload(&stored, "Kirby.nsp", None, &uploader())
            .unwrap();
        let result = registrar.register_upload(&stored, "Kirby Again.nsp", None, &uploader());
        assert!(matches!(
            result,
            Err(VaultError::Upload(UploadError::DuplicateSource(_)))
        ));
    }

    #[test]
    fn test_register_upload_rejects_outside_path() {
        let (_temp_dir, registrar, _db) = setup();
        let elsewhere = TempDir::new().unwrap();
        let stored = elsewhere.path().join("Kirby.nsp");
        std::fs::write(&stored, b"a").unwrap();

        let result = registrar.register_upload(&stored, "Kirby.nsp", None, &uploader());
        assert!(matches!(
            result,
            Err(VaultError::Upload(UploadError::PathTraversal(_)))
        ));
    }

    #[test]
    fn test_register_upload_missing_file() {
        let (temp_dir, registrar, _db) = setup();
        let stored = temp_dir.path().join("Ghost.xci");

        let result = registrar.register_upload(&stored, "Ghost.xci", None, &uploader());
        assert!(matches!(
            result,
            Err(VaultError::Upload(UploadError::MissingFile(_)))
        ));
    }

    #[test]
    fn test_register_upload_into_registered_directory() {
        let (_temp_dir, registrar, db) = setup();
        let library = TempDir::new().unwrap();
        let dir = directory_repo::insert(&db, library.path().to_str().unwrap()).unwrap();

        let prepared = registrar.prepare("Pikmin.xci", Some(&dir.id)).unwrap();
        assert_eq!(prepared.destination, library.path().join("Pikmin.xci"));
        std::fs::write(&prepared.destination, b"pik").unwrap();

        let entry = registrar
            .register_upload(&prepared.destination, "Pikmin.xci", Some(&dir.id), &uploader())
            .unwrap();
        assert_eq!(entry.metadata["directory_id"], dir.id.as_str());
    }

    #[test]
    fn test_unknown_directory_is_rejected() {
        let (_temp_dir, registrar, _db) = setup();
        assert!(matches!(
            registrar.prepare("Pikmin.xci", Some("nope")),
            Err(VaultError::Scan(ScanError::DirectoryNotFound(_)))
        ));
    }
}
