//! JSON file backend for the migration engine.
//!
//! The whole store is one JSON object on disk. It is loaded once when the
//! backend is opened and rewritten atomically after every mutation, which
//! matches the run-once, sole-writer model of a startup migration.

use super::StorageService;
use crate::core::{MigrationError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

// ============================================================================
// JSON File Storage
// ============================================================================

pub struct JsonFileStorage {
    path: PathBuf,
    records: RwLock<Map<String, Value>>,
}

impl JsonFileStorage {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => map,
                other => {
                    return Err(MigrationError::Storage(format!(
                        "Store file '{}' must contain a JSON object, found {}",
                        path.display(),
                        json_kind(&other)
                    )));
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                return Err(MigrationError::IoError(format!(
                    "Failed to read store file '{}': {}",
                    path.display(),
                    err
                )));
            }
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current contents, as they were last written to disk.
    pub async fn snapshot(&self) -> Value {
        Value::Object(self.records.read().await.clone())
    }

    async fn flush(&self, records: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        atomic_write(&self.path, &bytes).await
    }
}

#[async_trait]
impl StorageService for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(key.to_string(), value);
        self.flush(&records).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&records).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|err| {
            MigrationError::IoError(format!(
                "Failed to create parent directory '{}': {}",
                parent.display(),
                err
            ))
        })?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await.map_err(|err| {
        MigrationError::IoError(format!(
            "Failed to write temp file '{}': {}",
            tmp.display(),
            err
        ))
    })?;

    fs::rename(&tmp, path).await.map_err(|err| {
        MigrationError::IoError(format!(
            "Failed to rename temp file '{}' -> '{}': {}",
            tmp.display(),
            path.display(),
            err
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("state.json"))
            .await
            .unwrap();

        assert_eq!(storage.get("stateVersion").await.unwrap(), None);
        assert!(!dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let storage = JsonFileStorage::open(&path).await.unwrap();
            storage.save("stateVersion", json!(9)).await.unwrap();
            storage.save("user1", json!({"profile": {}})).await.unwrap();
            storage.remove("user1").await.unwrap();
        }

        let reopened = JsonFileStorage::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot().await, json!({"stateVersion": 9}));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_non_object_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = JsonFileStorage::open(&path).await.err().unwrap();
        assert!(matches!(err, MigrationError::Storage(msg) if msg.contains("an array")));
    }
}
