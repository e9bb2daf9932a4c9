use super::{section_mut, take_field};
use crate::core::{AccountEntry, ClientType, GLOBAL_KEY, KeyDefinitionLike, Result};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use crate::storage::StorageService;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Value, json};

pub const VAULT_TIMEOUT: KeyDefinitionLike =
    KeyDefinitionLike::new("vaultTimeoutSettings", "vaultTimeout");
pub const VAULT_TIMEOUT_ACTION: KeyDefinitionLike =
    KeyDefinitionLike::new("vaultTimeoutSettings", "vaultTimeoutAction");

const SETTINGS: &str = "settings";
const TIMEOUT_FIELD: &str = "vaultTimeout";
const ACTION_FIELD: &str = "vaultTimeoutAction";
const NEVER: &str = "never";

// Desktop kept a second copy of the global settings under dotted keys.
const DESKTOP_GLOBAL_KEYS: [&str; 2] = ["global.vaultTimeout", "global.vaultTimeoutAction"];

// Negative sentinels used by the old numeric representation.
const NAMED_TIMEOUTS: [(i64, &str); 4] = [
    (-1, "onRestart"),
    (-2, "onLocked"),
    (-3, "onSleep"),
    (-4, "onIdle"),
];

fn to_named_timeout(legacy: Value) -> Value {
    if legacy.is_null() {
        return json!(NEVER);
    }
    let named = legacy
        .as_i64()
        .and_then(|minutes| NAMED_TIMEOUTS.iter().find(|(code, _)| *code == minutes))
        .map(|(_, name)| json!(name));
    named.unwrap_or(legacy)
}

fn to_legacy_timeout(named: Value) -> Value {
    if named.as_str() == Some(NEVER) {
        return Value::Null;
    }
    let legacy = named
        .as_str()
        .and_then(|name| NAMED_TIMEOUTS.iter().find(|(_, candidate)| *candidate == name))
        .map(|(code, _)| json!(code));
    legacy.unwrap_or(named)
}

/// Moves vault timeout settings from the account blobs to user-scoped keys.
///
/// The CLI has no timeout of its own, so CLI accounts without one get
/// `"never"`. Global copies are dropped, not migrated.
#[derive(Debug, Clone)]
pub struct VaultTimeoutSettingsMigrator {
    versions: MigratorVersions,
}

impl VaultTimeoutSettingsMigrator {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            versions: MigratorVersions::new(from, to),
        }
    }
}

async fn migrate_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let Some(mut account) = entry.account else {
        return Ok(());
    };
    let user_id = entry.user_id.as_str();
    let is_cli = helper.client_type() == ClientType::Cli;

    let timeout = take_field(&mut account, SETTINGS, TIMEOUT_FIELD);
    let action = take_field(&mut account, SETTINGS, ACTION_FIELD);
    let changed = timeout.is_some() || action.is_some();

    match timeout {
        Some(timeout) => {
            helper
                .set_to_user(user_id, &VAULT_TIMEOUT, &to_named_timeout(timeout))
                .await?
        }
        None if is_cli => {
            let existing = helper.get_from_user::<Value>(user_id, &VAULT_TIMEOUT).await?;
            if existing.is_none() {
                helper.set_to_user(user_id, &VAULT_TIMEOUT, NEVER).await?;
            }
        }
        None => {}
    }
    if let Some(action) = action.filter(|action| !action.is_null()) {
        helper.set_to_user(user_id, &VAULT_TIMEOUT_ACTION, &action).await?;
    }

    if changed {
        helper.set(user_id, &account).await?;
    }
    Ok(())
}

async fn rollback_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let user_id = entry.user_id.as_str();
    let timeout = helper.get_from_user::<Value>(user_id, &VAULT_TIMEOUT).await?;
    let action = helper.get_from_user::<Value>(user_id, &VAULT_TIMEOUT_ACTION).await?;

    if timeout.is_some() || action.is_some() {
        if let Some(mut account) = entry.account {
            if let Some(settings) = section_mut(&mut account, SETTINGS) {
                if let Some(timeout) = timeout {
                    settings.insert(TIMEOUT_FIELD.to_string(), to_legacy_timeout(timeout));
                }
                if let Some(action) = action {
                    settings.insert(ACTION_FIELD.to_string(), action);
                }
                helper.set(user_id, &account).await?;
            }
        }
    }

    helper.set_to_user(user_id, &VAULT_TIMEOUT, &Value::Null).await?;
    helper.set_to_user(user_id, &VAULT_TIMEOUT_ACTION, &Value::Null).await
}

#[async_trait]
impl Migrator for VaultTimeoutSettingsMigrator {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        let accounts = helper.get_accounts::<Value>().await?;
        try_join_all(accounts.into_iter().map(|entry| migrate_account(helper, entry))).await?;

        if let Some(Value::Object(mut global)) = helper.get::<Value>(GLOBAL_KEY).await? {
            let removed_timeout = global.remove(TIMEOUT_FIELD).is_some();
            let removed_action = global.remove(ACTION_FIELD).is_some();
            if removed_timeout || removed_action {
                helper.set(GLOBAL_KEY, &global).await?;
            }
        }

        for key in DESKTOP_GLOBAL_KEYS {
            if helper.storage().has(key).await? {
                helper.remove(key).await?;
            }
        }
        Ok(())
    }

    async fn rollback(&self, helper: &MigrationHelper) -> Result<()> {
        let accounts = helper.get_accounts::<Value>().await?;
        try_join_all(accounts.into_iter().map(|entry| rollback_account(helper, entry))).await?;
        Ok(())
    }
}
