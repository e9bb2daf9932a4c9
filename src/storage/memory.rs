use super::StorageService;
use crate::core::{MigrationError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One mutation observed by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq)]
pub enum StorageWrite {
    Save { key: String, value: Value },
    Remove { key: String },
}

impl StorageWrite {
    pub fn key(&self) -> &str {
        match self {
            StorageWrite::Save { key, .. } | StorageWrite::Remove { key } => key,
        }
    }
}

/// In-memory store that keeps an ordered log of every write.
///
/// Used by tests and by callers that want to dry-run a chain against a copy
/// of real data.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, Value>>,
    writes: RwLock<Vec<StorageWrite>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a JSON object, one record per top-level field.
    pub fn from_json(initial: Value) -> Result<Self> {
        match initial {
            Value::Object(map) => Ok(Self {
                records: RwLock::new(map.into_iter().collect()),
                writes: RwLock::new(Vec::new()),
            }),
            Value::Null => Ok(Self::new()),
            other => Err(MigrationError::Storage(format!(
                "Initial store contents must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Snapshot the whole store as a single JSON object.
    pub async fn to_json(&self) -> Value {
        let records = self.records.read().await;
        let map: Map<String, Value> = records
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(map)
    }

    pub async fn writes(&self) -> Vec<StorageWrite> {
        self.writes.read().await.clone()
    }

    pub async fn writes_to(&self, key: &str) -> Vec<StorageWrite> {
        self.writes
            .read()
            .await
            .iter()
            .filter(|write| write.key() == key)
            .cloned()
            .collect()
    }

    pub async fn clear_writes(&self) {
        self.writes.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.clone());
        self.writes.write().await.push(StorageWrite::Save {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        self.writes.write().await.push(StorageWrite::Remove {
            key: key.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_get_remove() {
        let storage = MemoryStorage::new();
        storage.save("key", json!({"a": 1})).await.unwrap();

        assert_eq!(storage.get("key").await.unwrap(), Some(json!({"a": 1})));
        assert!(storage.has("key").await.unwrap());

        storage.remove("key").await.unwrap();
        assert_eq!(storage.get("key").await.unwrap(), None);
        assert!(!storage.has("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_null_is_not_present() {
        let storage = MemoryStorage::new();
        storage.save("key", Value::Null).await.unwrap();
        assert!(!storage.has("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_log_is_ordered() {
        let storage = MemoryStorage::from_json(json!({"existing": true})).unwrap();
        storage.save("a", json!(1)).await.unwrap();
        storage.remove("existing").await.unwrap();
        storage.save("a", json!(2)).await.unwrap();

        assert_eq!(
            storage.writes().await,
            vec![
                StorageWrite::Save { key: "a".into(), value: json!(1) },
                StorageWrite::Remove { key: "existing".into() },
                StorageWrite::Save { key: "a".into(), value: json!(2) },
            ]
        );
        assert_eq!(storage.writes_to("a").await.len(), 2);
        assert_eq!(storage.to_json().await, json!({"a": 2}));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(MemoryStorage::from_json(json!([1, 2, 3])).is_err());
    }
}
