use super::key_scheme::{AccountDirectory, KeyScheme};
use crate::core::{
    AUTHENTICATED_ACCOUNTS_KEY, AccountEntry, ClientType, KNOWN_ACCOUNTS, KeyDefinitionLike,
    MigrationError, MigrationHelperType, Result, UserId,
};
use crate::storage::StorageService;
use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Storage adapter handed to every migrator.
///
/// This is the only component that reads or writes raw storage. It hides the
/// two key-building eras (nested legacy blobs before v9, flat namespaced keys
/// from v9) and the two places known user ids have been kept (before and
/// after v60) behind one interface. Both strategies are re-selected whenever
/// the tracked version changes, so migrator bodies never check versions to
/// build keys.
pub struct MigrationHelper {
    current_version: u32,
    storage: Arc<dyn StorageService>,
    helper_type: MigrationHelperType,
    client_type: ClientType,
    key_scheme: KeyScheme,
    account_directory: AccountDirectory,
}

impl MigrationHelper {
    pub fn new(
        current_version: u32,
        storage: Arc<dyn StorageService>,
        helper_type: MigrationHelperType,
        client_type: ClientType,
    ) -> Self {
        Self {
            current_version,
            storage,
            helper_type,
            client_type,
            key_scheme: KeyScheme::for_version(current_version),
            account_directory: AccountDirectory::for_version(current_version),
        }
    }

    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn set_current_version(&mut self, version: u32) {
        self.current_version = version;
        self.key_scheme = KeyScheme::for_version(version);
        self.account_directory = AccountDirectory::for_version(version);
    }

    pub fn helper_type(&self) -> &MigrationHelperType {
        &self.helper_type
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    pub fn key_scheme(&self) -> KeyScheme {
        self.key_scheme
    }

    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    /// Diagnostics only; never affects control flow.
    pub fn info(&self, message: &str) {
        info!(
            helper_type = %self.helper_type,
            version = self.current_version,
            "{}",
            message
        );
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    /// Read and decode the record at `key`. A stored `null` reads as `None`.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        info!(key, "get");
        match self.storage.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub async fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        info!(key, "set");
        let value = serde_json::to_value(value)?;
        self.storage.save(key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        info!(key, "remove");
        self.storage.remove(key).await
    }

    // ========================================================================
    // Versioned access (v9+)
    // ========================================================================

    pub async fn get_from_global<T>(&self, key_definition: &KeyDefinitionLike) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.key_scheme.global_key(key_definition)?;
        self.get(&key).await
    }

    pub async fn set_to_global<T>(&self, key_definition: &KeyDefinitionLike, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let key = self.key_scheme.global_key(key_definition)?;
        self.set(&key, value).await
    }

    pub async fn remove_from_global(&self, key_definition: &KeyDefinitionLike) -> Result<()> {
        let key = self.key_scheme.global_key(key_definition)?;
        self.remove(&key).await
    }

    pub async fn get_from_user<T>(
        &self,
        user_id: &str,
        key_definition: &KeyDefinitionLike,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.key_scheme.user_key(user_id, key_definition)?;
        self.get(&key).await
    }

    pub async fn set_to_user<T>(
        &self,
        user_id: &str,
        key_definition: &KeyDefinitionLike,
        value: &T,
    ) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let key = self.key_scheme.user_key(user_id, key_definition)?;
        self.set(&key, value).await
    }

    pub async fn remove_from_user(
        &self,
        user_id: &str,
        key_definition: &KeyDefinitionLike,
    ) -> Result<()> {
        let key = self.key_scheme.user_key(user_id, key_definition)?;
        self.remove(&key).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Ids of every known user, in stored order. Missing data yields an
    /// empty list.
    pub async fn get_known_user_ids(&self) -> Result<Vec<UserId>> {
        match self.account_directory {
            AccountDirectory::AuthenticatedAccounts => Ok(self
                .get::<Vec<UserId>>(AUTHENTICATED_ACCOUNTS_KEY)
                .await?
                .unwrap_or_default()),
            AccountDirectory::GlobalAccounts => Ok(self
                .get_from_global::<Map<String, Value>>(&KNOWN_ACCOUNTS)
                .await?
                .map(|accounts| accounts.keys().cloned().collect())
                .unwrap_or_default()),
        }
    }

    /// Every known user with their legacy account blob. Users without a
    /// stored blob are still returned, with `account: None`.
    pub async fn get_accounts<T>(&self) -> Result<Vec<AccountEntry<T>>>
    where
        T: DeserializeOwned + Send,
    {
        let user_ids = self.get_known_user_ids().await?;
        try_join_all(user_ids.into_iter().map(|user_id| async move {
            let account = self.get::<T>(&user_id).await?;
            Ok::<_, MigrationError>(AccountEntry { user_id, account })
        }))
        .await
    }
}

impl std::fmt::Debug for MigrationHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationHelper")
            .field("current_version", &self.current_version)
            .field("helper_type", &self.helper_type)
            .field("client_type", &self.client_type)
            .field("key_scheme", &self.key_scheme)
            .field("account_directory", &self.account_directory)
            .finish()
    }
}
