use super::take_field;
use crate::core::{AccountEntry, Direction, GLOBAL_KEY, MigrationError, Result, STATE_VERSION_KEY};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Map, Value, json};

/// Drops the deprecated `keys.legacyEtmKey` from every account blob.
///
/// The old value is gone once deleted, so there is no rollback.
#[derive(Debug, Clone)]
pub struct RemoveLegacyEtmKeyMigrator {
    versions: MigratorVersions,
}

impl RemoveLegacyEtmKeyMigrator {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            versions: MigratorVersions::new(from, to),
        }
    }
}

async fn update_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let Some(mut account) = entry.account else {
        return Ok(());
    };
    if take_field(&mut account, "keys", "legacyEtmKey").is_none() {
        return Ok(());
    }
    helper.set(&entry.user_id, &account).await
}

#[async_trait]
impl Migrator for RemoveLegacyEtmKeyMigrator {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        let accounts = helper.get_accounts::<Value>().await?;
        try_join_all(accounts.into_iter().map(|entry| update_account(helper, entry))).await?;
        Ok(())
    }

    async fn rollback(&self, _helper: &MigrationHelper) -> Result<()> {
        Err(MigrationError::Irreversible)
    }

    // This version predates the flat marker: it lives inside the global blob.
    async fn update_version(&self, helper: &mut MigrationHelper, direction: Direction) -> Result<()> {
        let end_version = self.versions.end_version(direction);
        helper.set_current_version(end_version);

        let mut global = match helper.get::<Value>(GLOBAL_KEY).await? {
            Some(Value::Object(global)) => global,
            _ => Map::new(),
        };
        global.insert(STATE_VERSION_KEY.to_string(), json!(end_version));
        helper.set(GLOBAL_KEY, &global).await
    }
}
