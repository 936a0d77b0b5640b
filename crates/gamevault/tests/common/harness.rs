//! Test harness for isolated test execution.
//!
//! Each `TestHarness` owns a temp directory holding a game library, an
//! upload directory and an on-disk database, so tests never share state.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use gamevault::config::VaultConfig;
use gamevault::{Actor, Database, Entry, Vault};

use super::ConfigBuilder;

/// MD5 and SHA-256 of the bytes `hello world`.
pub const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
pub const HELLO_SHA256: &str =
    "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

pub struct TestHarness {
    temp_dir: TempDir,
    /// Scan root with game files.
    pub library_dir: PathBuf,
    /// Default upload destination.
    pub upload_dir: PathBuf,
    /// On-disk database file.
    pub db_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let library = temp_dir.child("library");
        let uploads = temp_dir.child("uploads");
        library.create_dir_all().expect("Failed to create library dir");
        uploads.create_dir_all().expect("Failed to create upload dir");

        Self {
            library_dir: library.path().to_path_buf(),
            upload_dir: uploads.path().to_path_buf(),
            db_path: temp_dir.child("data").child("vault.db").path().to_path_buf(),
            temp_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config pointing at this harness's directories.
    pub fn config(&self) -> VaultConfig {
        ConfigBuilder::new()
            .database_path(&self.db_path)
            .upload_directory(&self.upload_dir)
            .build()
    }

    /// Opens (or reopens) the harness database.
    pub fn database(&self) -> Database {
        Database::open(&self.db_path).expect("Failed to open test database")
    }

    /// A vault over the harness database.
    pub fn vault(&self) -> Vault {
        Vault::new(self.database(), &self.config())
    }

    /// Writes a file under the library directory, creating parents.
    pub fn write_game(&self, relative: &str, content: &[u8]) -> PathBuf {
        let child = self.temp_dir.child("library").child(relative);
        if let Some(parent) = child.path().parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        child.write_binary(content).expect("Failed to write game file");
        child.path().to_path_buf()
    }

    pub fn admin(&self) -> Actor {
        Actor::new("u-admin", "admin").with_ip("127.0.0.1")
    }

    pub fn player(&self) -> Actor {
        Actor::new("u-player", "player").with_ip("203.0.113.10")
    }

    pub fn moderator(&self) -> Actor {
        Actor::new("u-mod", "moderator").with_ip("203.0.113.20")
    }
}

/// Polls until `check` returns `Some`, or panics after `timeout`.
pub fn wait_for<T>(timeout: Duration, mut check: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(Instant::now() < deadline, "condition not met within {:?}", timeout);
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// The single entry whose source is `path`.
pub fn entry_for(vault: &Vault, path: &Path) -> Entry {
    gamevault::db::entry_repo::find_by_source(vault.database(), path.to_str().unwrap())
        .expect("query failed")
        .expect("entry not registered")
}
