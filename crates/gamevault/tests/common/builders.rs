//! Builder for test configurations.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gamevault::config::{HashingConfig, ScanConfig, VaultConfig};

/// Builder for creating `VaultConfig` instances.
pub struct ConfigBuilder {
    config: VaultConfig,
}

impl ConfigBuilder {
    /// Defaults tuned for tests: no delays, small read buffer.
    pub fn new() -> Self {
        Self {
            config: VaultConfig {
                version: "1.0".to_string(),
                database_path: None,
                upload_directory: PathBuf::from("uploads"),
                scan: ScanConfig::default(),
                hashing: HashingConfig {
                    enabled: true,
                    initial_delay_secs: 0,
                    interval_secs: 3600,
                    entry_delay_ms: 0,
                    chunk_size: 4096,
                },
            },
        }
    }

    pub fn database_path(mut self, path: &Path) -> Self {
        self.config.database_path = Some(path.to_path_buf());
        self
    }

    pub fn upload_directory(mut self, path: &Path) -> Self {
        self.config.upload_directory = path.to_path_buf();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.scan.max_depth = depth;
        self
    }

    pub fn interval_secs(mut self, secs: u64) -> Self {
        self.config.hashing.interval_secs = secs;
        self
    }

    pub fn build(self) -> VaultConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
