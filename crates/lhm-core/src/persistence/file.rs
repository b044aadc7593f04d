// # File Persistence Port
//
// File-based implementation of PersistencePort with crash recovery.
//
// ## Purpose
//
// Keeps the registry across restarts. Every `set` rewrites the whole file.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "servers": [
//       { "id": 1736424000000, "host": "localhost", "label": "Vite", "port": 5173, ... }
//     ]
//   }
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::persistence_port::{PersistencePort, PersistencePortFactory};

/// Storage file format version
const STORAGE_FILE_VERSION: &str = "1.0";

/// File-based persistence port with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use lhm_core::persistence::FilePort;
/// use lhm_core::traits::PersistencePort;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let port = FilePort::new("/tmp/lhm/storage.json").await?;
///
///     // Atomically written to disk
///     port.set("servers", serde_json::json!([])).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FilePort {
    path: PathBuf,
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

/// Serializable storage file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StorageFileFormat {
    version: String,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

/// Why a storage file could not be loaded
enum LoadFailure {
    /// The file exists but is not a valid storage document
    Corrupt(Error),
    /// The file could not be read at all
    Unreadable(Error),
}

impl FilePort {
    /// Create or load a file persistence port
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing storage file
    /// 3. If it is corrupt, try to load from backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Path of the storage file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load entries from file with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, Value>, Error> {
        match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded storage file: {} key(s)", entries.len());
                Ok(entries)
            }
            Err(LoadFailure::Unreadable(e)) => Err(e),
            Err(LoadFailure::Corrupt(e)) => {
                tracing::warn!(
                    "Storage file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty storage.");
                    return Ok(BTreeMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(entries) => {
                        tracing::info!("Recovered storage from backup: {} key(s)", entries.len());

                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await
                        {
                            tracing::error!(
                                "Failed to restore storage file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(entries)
                    }
                    Err(LoadFailure::Corrupt(backup_err) | LoadFailure::Unreadable(backup_err)) => {
                        tracing::error!(
                            "Backup also unusable: {}. Starting with empty storage.",
                            backup_err
                        );
                        Ok(BTreeMap::new())
                    }
                }
            }
        }
    }

    /// Load entries from file
    async fn load(path: &Path) -> Result<BTreeMap<String, Value>, LoadFailure> {
        if !path.exists() {
            tracing::debug!("Storage file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadFailure::Unreadable(Error::persistence(format!(
                "Failed to read storage file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StorageFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadFailure::Corrupt(Error::persistence(format!(
                "Failed to parse storage file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != STORAGE_FILE_VERSION {
            tracing::warn!(
                "Storage file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORAGE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.entries)
    }

    /// Write all entries to file atomically
    async fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), Error> {
        let file = StorageFileFormat {
            version: STORAGE_FILE_VERSION.to_string(),
            entries: entries.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::persistence(format!("Failed to serialize storage: {}", e)))?;

        let temp_path = self.temp_path();
        if let Err(e) = Self::write_temp(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        tracing::trace!("Storage written to file: {}", self.path.display());
        Ok(())
    }

    async fn write_temp(temp_path: &Path, json: &str) -> Result<(), Error> {
        let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        temp.write_all(json.as_bytes()).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to write to temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        temp.flush().await.map_err(|e| {
            Error::persistence(format!(
                "Failed to flush temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Restore storage file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored storage file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl PersistencePort for FilePort {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        // Held across the write so concurrent sets reach the disk in order.
        // The cache only takes the new value once the file has it.
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        next.insert(key.to_string(), value);
        self.write_entries(&next).await?;
        *guard = next;
        Ok(())
    }

    fn port_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for the `file` storage type
///
/// Expects the serialized `StorageConfig::File { path }`.
pub struct FilePortFactory;

#[async_trait]
impl PersistencePortFactory for FilePortFactory {
    async fn create(&self, config: &Value) -> Result<Box<dyn PersistencePort>, Error> {
        let path = config
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("File storage requires a non-empty path"))?;

        Ok(Box::new(FilePort::new(path).await?))
    }
}
