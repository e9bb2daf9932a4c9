use crate::core::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Storage collaborator - an opaque async key-value namespace.
///
/// Backends have no partial-field update: callers that need to change one
/// field of a stored object read the whole object and save it back.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Read the record at `key`, `None` when nothing is stored
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Check whether a non-null record exists at `key`
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(matches!(self.get(key).await?, Some(value) if !value.is_null()))
    }

    /// Write `value` at `key`, replacing whatever was there
    async fn save(&self, key: &str, value: Value) -> Result<()>;

    /// Delete the record at `key`; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}
