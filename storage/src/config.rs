//! Storage config: where the database lives, its name, and the schema version to open.

use std::env;
use std::path::PathBuf;

use crate::error::StorageError;
use crate::schema::{DB_NAME, DB_VERSION};

/// Location and version of the local database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding the database file.
    pub data_dir: PathBuf,
    /// Database name; the file is `<data_dir>/<name>.db`.
    pub name: String,
    /// Schema version requested on open.
    pub version: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            name: DB_NAME.to_string(),
            version: DB_VERSION,
        }
    }
}

impl StorageConfig {
    /// Default name and version, stored under `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables: COMPANION_DATA_DIR, COMPANION_DB_NAME,
    /// COMPANION_DB_VERSION. Unset or unparsable values fall back to the defaults.
    pub fn load() -> Self {
        let defaults = Self::default();
        let data_dir = env::var("COMPANION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let name = env::var("COMPANION_DB_NAME").unwrap_or(defaults.name);
        let version = env::var("COMPANION_DB_VERSION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.version);

        Self {
            data_dir,
            name,
            version,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.name))
    }

    /// Validate config (name must be a plain non-empty file stem, version at least 1).
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.name.trim().is_empty() {
            return Err(StorageError::Open("database name is empty".to_string()));
        }
        if self.name.contains(['/', '\\']) {
            return Err(StorageError::Open(format!(
                "database name must not contain path separators: {}",
                self.name
            )));
        }
        if self.version == 0 {
            return Err(StorageError::Open(
                "database version must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
