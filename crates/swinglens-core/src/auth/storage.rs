//! Durable storage backends for the session credential.
//!
//! Every backend persists a single key-value pair (`swinglens_token` → raw
//! credential string). Backends are synchronous; the token store moves calls
//! onto the blocking pool so they never stall the event loop.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use thiserror::Error;

/// Key under which the credential is persisted
pub const TOKEN_KEY: &str = "swinglens_token";

/// Key-value file name for [`FileStorage`]
pub const STORAGE_FILE: &str = "storage.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Refusing to store an empty credential")]
    EmptyCredential,

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// A durable home for the session credential.
pub trait CredentialStorage: Send + Sync {
    /// Read the persisted credential. `Ok(None)` means nothing is stored.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Persist the credential, replacing any previous value.
    fn write(&self, credential: &str) -> Result<(), StorageError>;

    /// Remove the credential. Removing an absent credential succeeds.
    fn remove(&self) -> Result<(), StorageError>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// In-process storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, as if a previous run had persisted `credential`.
    pub fn with_credential(credential: &str) -> Self {
        Self {
            value: Mutex::new(Some(credential.to_string())),
        }
    }
}

impl CredentialStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.value.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn write(&self, credential: &str) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// JSON key-value file, shared with any other keys a client stores there.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Storage file inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StorageError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            serde_json::to_string_pretty(map).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let map = self.read_map()?;
        match map.get(TOKEN_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(token)) => Ok(Some(token.clone())),
            Some(other) => Err(StorageError::Corrupt(format!(
                "expected string for {}, found {}",
                TOKEN_KEY, other
            ))),
        }
    }

    fn write(&self, credential: &str) -> Result<(), StorageError> {
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), Value::String(credential.to_string()));
        self.write_map(&map)
    }

    fn remove(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        if map.is_empty() {
            std::fs::remove_file(&self.path)?;
            Ok(())
        } else {
            self.write_map(&map)
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read().unwrap(), None);

        storage.write("abc").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some("abc"));

        storage.remove().unwrap();
        assert_eq!(storage.read().unwrap(), None);
        // Removing again is fine
        storage.remove().unwrap();
    }

    #[test]
    fn test_file_storage_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        assert_eq!(storage.read().unwrap(), None);
        storage.remove().unwrap();
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStorage::in_dir(dir.path()).write("jwt-1").unwrap();

        let reopened = FileStorage::in_dir(dir.path());
        assert_eq!(reopened.read().unwrap().as_deref(), Some("jwt-1"));

        let raw = std::fs::read_to_string(reopened.path()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[TOKEN_KEY], "jwt-1");
    }

    #[test]
    fn test_file_storage_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORAGE_FILE);
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let storage = FileStorage::new(path.clone());
        storage.write("jwt-2").unwrap();
        storage.remove().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["theme"], "dark");
        assert!(value.get(TOKEN_KEY).is_none());
    }

    #[test]
    fn test_file_storage_remove_deletes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        storage.write("jwt-3").unwrap();
        storage.remove().unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        std::fs::write(storage.path(), "not json").unwrap();
        assert!(matches!(storage.read(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_file_storage_non_string_token_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        std::fs::write(storage.path(), r#"{"swinglens_token": 42}"#).unwrap();
        assert!(matches!(storage.read(), Err(StorageError::Corrupt(_))));
    }
}
