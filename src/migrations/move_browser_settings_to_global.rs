use super::take_field;
use crate::core::{GLOBAL_KEY, MigrationError, Result};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Map, Value};

const TOGGLES: [&str; 3] = [
    "disableAddLoginNotification",
    "disableChangedPasswordNotification",
    "disableContextMenuItem",
];
const NEVER_DOMAINS: &str = "neverDomains";

/// Hoists the per-account browser notification settings into the global blob.
///
/// A toggle is only written when at least one account ever set it. An
/// account that never touched a toggle counts as `false`, and any `false`
/// wins over `true`. `neverDomains` maps are merged.
#[derive(Debug, Clone)]
pub struct MoveBrowserSettingsToGlobal {
    versions: MigratorVersions,
}

impl MoveBrowserSettingsToGlobal {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            versions: MigratorVersions::new(from, to),
        }
    }
}

#[async_trait]
impl Migrator for MoveBrowserSettingsToGlobal {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        let mut accounts: Vec<(String, Value)> = helper
            .get_accounts::<Value>()
            .await?
            .into_iter()
            .filter_map(|entry| entry.account.map(|account| (entry.user_id, account)))
            .collect();

        let mut hoisted = Map::new();
        let mut toggle_values: Vec<Vec<Option<bool>>> = vec![Vec::new(); TOGGLES.len()];
        let mut never_domains: Option<Map<String, Value>> = None;
        let mut changed_accounts = Vec::new();

        for (user_id, account) in accounts.iter_mut() {
            let mut changed = false;
            for (index, toggle) in TOGGLES.iter().enumerate() {
                let value = take_field(account, "settings", toggle);
                changed |= value.is_some();
                toggle_values[index].push(value.and_then(|value| value.as_bool()));
            }

            if let Some(domains) = take_field(account, "settings", NEVER_DOMAINS) {
                changed = true;
                let merged = never_domains.get_or_insert_with(Map::new);
                if let Value::Object(domains) = domains {
                    merged.extend(domains);
                }
            }

            if changed {
                changed_accounts.push((user_id.clone(), account.clone()));
            }
        }

        for (toggle, values) in TOGGLES.iter().zip(toggle_values) {
            if values.iter().any(Option::is_some) {
                let all_true = values.iter().all(|value| *value == Some(true));
                hoisted.insert(toggle.to_string(), Value::Bool(all_true));
            }
        }
        if let Some(domains) = never_domains {
            hoisted.insert(NEVER_DOMAINS.to_string(), Value::Object(domains));
        }

        if !hoisted.is_empty() {
            let mut global = match helper.get::<Value>(GLOBAL_KEY).await? {
                Some(Value::Object(global)) => global,
                _ => Map::new(),
            };
            global.extend(hoisted);
            helper.set(GLOBAL_KEY, &global).await?;
        }

        try_join_all(
            changed_accounts
                .iter()
                .map(|(user_id, account)| helper.set(user_id, account)),
        )
        .await?;
        Ok(())
    }

    async fn rollback(&self, _helper: &MigrationHelper) -> Result<()> {
        Err(MigrationError::Irreversible)
    }
}
