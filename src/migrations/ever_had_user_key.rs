use super::{section_mut, take_field};
use crate::core::{AccountEntry, KeyDefinitionLike, Result};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

pub const EVER_HAD_USER_KEY: KeyDefinitionLike = KeyDefinitionLike::new("crypto", "everHadUserKey");

const PROFILE: &str = "profile";
const FIELD: &str = "everHadUserKey";

/// Moves `profile.everHadUserKey` out of each account blob into its own
/// user-scoped key.
#[derive(Debug, Clone)]
pub struct EverHadUserKeyMigrator {
    versions: MigratorVersions,
}

impl EverHadUserKeyMigrator {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            versions: MigratorVersions::new(from, to),
        }
    }
}

async fn migrate_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let user_id = entry.user_id.as_str();
    let mut account = entry.account;
    let flag = account
        .as_mut()
        .and_then(|account| take_field(account, PROFILE, FIELD));

    // Users without a blob still get the default flag; only the blob write is skipped.
    let Some(flag) = flag else {
        let existing = helper.get_from_user::<bool>(user_id, &EVER_HAD_USER_KEY).await?;
        if existing.is_none() {
            helper.set_to_user(user_id, &EVER_HAD_USER_KEY, &false).await?;
        }
        return Ok(());
    };

    let flag = flag.as_bool().unwrap_or(false);
    helper.set_to_user(user_id, &EVER_HAD_USER_KEY, &flag).await?;
    match account {
        Some(account) => helper.set(user_id, &account).await,
        None => Ok(()),
    }
}

async fn rollback_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let flag = helper
        .get_from_user::<bool>(&entry.user_id, &EVER_HAD_USER_KEY)
        .await?;

    if let (Some(flag), Some(mut account)) = (flag, entry.account) {
        if let Some(profile) = section_mut(&mut account, PROFILE) {
            profile.insert(FIELD.to_string(), Value::Bool(flag));
            helper.set(&entry.user_id, &account).await?;
        }
    }
    helper
        .set_to_user(&entry.user_id, &EVER_HAD_USER_KEY, &Value::Null)
        .await
}

#[async_trait]
impl Migrator for EverHadUserKeyMigrator {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        let accounts = helper.get_accounts::<Value>().await?;
        try_join_all(accounts.into_iter().map(|entry| migrate_account(helper, entry))).await?;
        Ok(())
    }

    async fn rollback(&self, helper: &MigrationHelper) -> Result<()> {
        let accounts = helper.get_accounts::<Value>().await?;
        try_join_all(accounts.into_iter().map(|entry| rollback_account(helper, entry))).await?;
        Ok(())
    }
}
