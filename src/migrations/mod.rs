//! Registered migrations.
//!
//! Each migrator is a one-off transform between two adjacent schema versions.
//! [`create_migration_builder`] assembles them into the chain the bootstrap
//! runs on startup.

pub mod ever_had_user_key;
pub mod move_browser_settings_to_global;
pub mod move_state_version;
pub mod min_version;
pub mod remove_legacy_etm_key;
pub mod server_config;
pub mod vault_timeout_settings;

pub use ever_had_user_key::{EVER_HAD_USER_KEY, EverHadUserKeyMigrator};
pub use move_browser_settings_to_global::MoveBrowserSettingsToGlobal;
pub use move_state_version::MoveStateVersionMigrator;
pub use min_version::MinVersionMigrator;
pub use remove_legacy_etm_key::RemoveLegacyEtmKeyMigrator;
pub use server_config::{SERVER_CONFIG, ServerConfigMigrator};
pub use vault_timeout_settings::{
    VAULT_TIMEOUT, VAULT_TIMEOUT_ACTION, VaultTimeoutSettingsMigrator,
};

use crate::core::{Direction, MigrationError, Result};
use crate::migration::{MigrationBuilder, Migrator};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Oldest stored version that can still be migrated.
pub const MIN_VERSION: u32 = 6;

/// Version produced by the full registered chain.
pub const CURRENT_VERSION: u32 = 11;

/// Every registered migrator, in chain order.
pub fn registered_migrators() -> Vec<Arc<dyn Migrator>> {
    vec![
        Arc::new(MinVersionMigrator::new()),
        Arc::new(RemoveLegacyEtmKeyMigrator::new(6, 7)),
        Arc::new(MoveStateVersionMigrator::new(7, 8)),
        Arc::new(MoveBrowserSettingsToGlobal::new(8, 9)),
        Arc::new(EverHadUserKeyMigrator::new(9, 10)),
        Arc::new(ServerConfigMigrator::new(10, 11)),
    ]
}

/// The forward chain `0 -> CURRENT_VERSION`.
pub fn create_migration_builder() -> Result<MigrationBuilder> {
    registered_migrators()
        .into_iter()
        .try_fold(MigrationBuilder::create(), |builder, migrator| {
            builder.push_step(migrator, Direction::Up)
        })
}

/// A rollback chain from `from` down to `to` over the registered migrators.
pub fn create_rollback_builder(from: u32, to: u32) -> Result<MigrationBuilder> {
    if to > from || from > CURRENT_VERSION {
        return Err(MigrationError::NoRollbackPath { from, to });
    }

    let mut builder = MigrationBuilder::starting_at(from);
    for migrator in registered_migrators().into_iter().rev() {
        let versions = migrator.versions();
        if versions.to <= from && versions.from >= to {
            builder = builder.push_step(migrator, Direction::Down)?;
        }
    }

    if builder.current_version() != to {
        return Err(MigrationError::NoRollbackPath { from, to });
    }
    Ok(builder)
}

// ============================================================================
// Legacy blob helpers
// ============================================================================

/// Removes `section.field` from a legacy blob, returning the old value
/// (including an explicit `null`). Non-object data is left alone.
pub(crate) fn take_field(blob: &mut Value, section: &str, field: &str) -> Option<Value> {
    blob.get_mut(section)?.as_object_mut()?.remove(field)
}

/// Returns the `section` object of a legacy blob, creating it (or replacing
/// a non-object value) when needed. `None` when the blob itself is not an
/// object.
pub(crate) fn section_mut<'a>(blob: &'a mut Value, section: &str) -> Option<&'a mut Map<String, Value>> {
    let blob = blob.as_object_mut()?;
    let entry = blob
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_chain_is_contiguous() {
        let builder = create_migration_builder().unwrap();
        assert_eq!(builder.current_version(), CURRENT_VERSION);
        assert_eq!(builder.steps().len(), registered_migrators().len());
        assert_eq!(builder.steps()[0].end_version(), MIN_VERSION);
    }

    #[test]
    fn rollback_builder_walks_down() {
        let builder = create_rollback_builder(11, 8).unwrap();
        assert_eq!(builder.current_version(), 8);
        let starts: Vec<u32> = builder.steps().iter().map(|step| step.start_version()).collect();
        assert_eq!(starts, vec![11, 10, 9]);
    }

    #[test]
    fn rollback_builder_rejects_upward_paths() {
        assert!(matches!(
            create_rollback_builder(8, 9),
            Err(MigrationError::NoRollbackPath { from: 8, to: 9 })
        ));
        assert!(create_rollback_builder(40, 9).is_err());
    }

    #[test]
    fn take_field_ignores_malformed_sections() {
        let mut blob = json!({ "profile": "not an object" });
        assert_eq!(take_field(&mut blob, "profile", "everHadUserKey"), None);
        assert_eq!(take_field(&mut json!(null), "profile", "x"), None);

        let mut blob = json!({ "profile": { "x": null, "y": 1 } });
        assert_eq!(take_field(&mut blob, "profile", "x"), Some(Value::Null));
        assert_eq!(blob, json!({ "profile": { "y": 1 } }));
    }

    #[test]
    fn section_mut_creates_missing_section() {
        let mut blob = json!({ "other": 1 });
        section_mut(&mut blob, "settings")
            .unwrap()
            .insert("serverConfig".into(), json!({}));
        assert_eq!(blob, json!({ "other": 1, "settings": { "serverConfig": {} } }));
        assert!(section_mut(&mut json!([1]), "settings").is_none());
    }
}
