use super::{section_mut, take_field};
use crate::core::{AccountEntry, KeyDefinitionLike, Result};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

pub const SERVER_CONFIG: KeyDefinitionLike = KeyDefinitionLike::new("config", "serverConfig");

const SETTINGS: &str = "settings";
const FIELD: &str = "serverConfig";

/// Moves `settings.serverConfig` from each account blob to a user-scoped key.
#[derive(Debug, Clone)]
pub struct ServerConfigMigrator {
    versions: MigratorVersions,
}

impl ServerConfigMigrator {
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
    let Some(config) = take_field(&mut account, SETTINGS, FIELD) else {
        return Ok(());
    };

    if !config.is_null() {
        helper.set_to_user(&entry.user_id, &SERVER_CONFIG, &config).await?;
    }
    helper.set(&entry.user_id, &account).await
}

async fn rollback_account(helper: &MigrationHelper, entry: AccountEntry<Value>) -> Result<()> {
    let config = helper
        .get_from_user::<Value>(&entry.user_id, &SERVER_CONFIG)
        .await?;

    if let (Some(config), Some(mut account)) = (config, entry.account) {
        if let Some(settings) = section_mut(&mut account, SETTINGS) {
            settings.insert(FIELD.to_string(), config);
            helper.set(&entry.user_id, &account).await?;
        }
    }
    helper
        .set_to_user(&entry.user_id, &SERVER_CONFIG, &Value::Null)
        .await
}

#[async_trait]
impl Migrator for ServerConfigMigrator {
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
