use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::digest::DigestState;

/// Whether an entry points at a local file or a remote URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Filepath,
    Url,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Filepath => "filepath",
            EntryKind::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "filepath" => Some(EntryKind::Filepath),
            "url" => Some(EntryKind::Url),
            _ => None,
        }
    }
}

/// Recognised game image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameFormat {
    Nsp,
    Nsz,
    Xci,
}

impl GameFormat {
    pub const ALL: [GameFormat; 3] = [GameFormat::Nsp, GameFormat::Nsz, GameFormat::Xci];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "nsp" => Some(GameFormat::Nsp),
            "nsz" => Some(GameFormat::Nsz),
            "xci" => Some(GameFormat::Xci),
            _ => None,
        }
    }

    /// Format of a path, judged by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            GameFormat::Nsp => "nsp",
            GameFormat::Nsz => "nsz",
            GameFormat::Xci => "xci",
        }
    }
}

/// A registered game file or URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub name: String,
    /// Absolute path or URL. Unique across the store.
    pub source: String,
    pub kind: EntryKind,
    pub format: GameFormat,
    pub size: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub file_created_at: Option<DateTime<Utc>>,
    pub file_modified_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub corrupt: bool,
    pub digest: DigestState,
}

impl Entry {
    /// Builds a fresh entry for a local file with no digests and no corrupt flag.
    pub fn new_file(
        name: impl Into<String>,
        source: impl Into<String>,
        format: GameFormat,
        size: u64,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            source: source.into(),
            kind: EntryKind::Filepath,
            format,
            size,
            created_by: created_by.into(),
            created_at: Utc::now(),
            file_created_at: None,
            file_modified_at: None,
            metadata: serde_json::Map::new(),
            corrupt: false,
            digest: DigestState::Unclaimed,
        }
    }

    /// Whether the hash worker should pick this entry up.
    ///
    /// Claimed entries are included so that work abandoned by an
    /// interrupted sweep is redone.
    pub fn needs_hashing(&self) -> bool {
        self.kind == EntryKind::Filepath && !self.digest.is_hashed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::digest::{Md5Digest, Sha256Digest};

    #[test]
    fn test_game_format_from_extension() {
        assert_eq!(GameFormat::from_extension("nsp"), Some(GameFormat::Nsp));
        assert_eq!(GameFormat::from_extension("NSZ"), Some(GameFormat::Nsz));
        assert_eq!(GameFormat::from_extension("Xci"), Some(GameFormat::Xci));
        assert_eq!(GameFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_game_format_from_path() {
        assert_eq!(
            GameFormat::from_path(Path::new("/games/Zelda.NSP")),
            Some(GameFormat::Nsp)
        );
        assert_eq!(GameFormat::from_path(Path::new("/games/readme")), None);
    }

    #[test]
    fn test_needs_hashing() {
        let mut entry = Entry::new_file("a", "/g/a.nsp", GameFormat::Nsp, 1, "admin");
        assert!(entry.needs_hashing());

        entry.digest = DigestState::Claimed { since: Utc::now() };
        assert!(entry.needs_hashing());

        entry.digest = DigestState::Hashed {
            md5: Md5Digest::parse(&"0".repeat(32)).unwrap(),
            sha256: Sha256Digest::parse(&"0".repeat(64)).unwrap(),
        };
        assert!(!entry.needs_hashing());

        entry.digest = DigestState::Unclaimed;
        entry.kind = EntryKind::Url;
        assert!(!entry.needs_hashing());
    }
}
