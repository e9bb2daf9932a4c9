use crate::core::{Direction, GLOBAL_KEY, MigrationError, Result, STATE_VERSION_KEY};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// Moves the version marker from `global.stateVersion` to the flat
/// `stateVersion` key.
#[derive(Debug, Clone)]
pub struct MoveStateVersionMigrator {
    versions: MigratorVersions,
}

impl MoveStateVersionMigrator {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            versions: MigratorVersions::new(from, to),
        }
    }
}

async fn global_object(helper: &MigrationHelper) -> Result<Map<String, Value>> {
    Ok(match helper.get::<Value>(GLOBAL_KEY).await? {
        Some(Value::Object(global)) => global,
        _ => Map::new(),
    })
}

#[async_trait]
impl Migrator for MoveStateVersionMigrator {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    // A store whose marker already sits at the flat key has been moved.
    async fn should_migrate(&self, helper: &MigrationHelper, direction: Direction) -> Result<bool> {
        let flat = helper.get::<Value>(STATE_VERSION_KEY).await?;
        let nested = global_object(helper)
            .await?
            .get(STATE_VERSION_KEY)
            .is_some_and(|version| !version.is_null());
        Ok(match direction {
            Direction::Up => nested || flat.is_none(),
            Direction::Down => flat.is_some(),
        })
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        let mut global = global_object(helper).await?;
        let version = global
            .remove(STATE_VERSION_KEY)
            .filter(|version| !version.is_null())
            .ok_or_else(|| {
                MigrationError::MissingVersionMarker(
                    "Migration failed, state version not found".to_string(),
                )
            })?;

        helper.set(STATE_VERSION_KEY, &version).await?;
        helper.set(GLOBAL_KEY, &global).await
    }

    async fn rollback(&self, helper: &MigrationHelper) -> Result<()> {
        let version = helper.get::<Value>(STATE_VERSION_KEY).await?.ok_or_else(|| {
            MigrationError::MissingVersionMarker(
                "Rollback failed, state version not found".to_string(),
            )
        })?;

        let mut global = global_object(helper).await?;
        global.insert(STATE_VERSION_KEY.to_string(), version);
        helper.set(GLOBAL_KEY, &global).await?;
        helper.remove(STATE_VERSION_KEY).await
    }

    // Up writes the flat marker, down writes the nested one.
    async fn update_version(&self, helper: &mut MigrationHelper, direction: Direction) -> Result<()> {
        let end_version = self.versions.end_version(direction);
        helper.set_current_version(end_version);

        match direction {
            Direction::Up => helper.set(STATE_VERSION_KEY, &end_version).await,
            Direction::Down => {
                let mut global = global_object(helper).await?;
                global.insert(STATE_VERSION_KEY.to_string(), json!(end_version));
                helper.set(GLOBAL_KEY, &global).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClientType, MigrationHelperType};
    use crate::migration::current_version;
    use crate::storage::{MemoryStorage, StorageService};
    use std::sync::Arc;

    fn setup(version: u32, initial: Value) -> (Arc<MemoryStorage>, MigrationHelper) {
        let storage = Arc::new(MemoryStorage::from_json(initial).unwrap());
        let helper = MigrationHelper::new(
            version,
            storage.clone(),
            MigrationHelperType::GENERAL,
            ClientType::Browser,
        );
        (storage, helper)
    }

    #[tokio::test]
    async fn test_moves_marker_out_of_global() {
        let (storage, mut helper) = setup(7, json!({ "global": { "stateVersion": 7, "theme": "dark" } }));
        let sut = MoveStateVersionMigrator::new(7, 8);

        assert!(sut.should_migrate(&helper, Direction::Up).await.unwrap());
        sut.migrate(&helper).await.unwrap();
        sut.update_version(&mut helper, Direction::Up).await.unwrap();

        assert_eq!(storage.get("global").await.unwrap(), Some(json!({ "theme": "dark" })));
        assert_eq!(storage.get("stateVersion").await.unwrap(), Some(json!(8)));
        assert_eq!(current_version(storage.as_ref()).await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_missing_marker_is_fatal() {
        let (storage, helper) = setup(7, json!({ "global": { "theme": "dark" } }));

        let err = MoveStateVersionMigrator::new(7, 8).migrate(&helper).await.unwrap_err();

        assert!(matches!(err, MigrationError::MissingVersionMarker(_)));
        assert!(storage.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_already_moved_marker_is_skipped() {
        let (_storage, helper) = setup(8, json!({ "stateVersion": 8, "global": { "theme": "dark" } }));
        assert!(
            !MoveStateVersionMigrator::new(7, 8)
                .should_migrate(&helper, Direction::Up)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rollback_moves_marker_back() {
        let (storage, mut helper) = setup(8, json!({ "stateVersion": 8, "global": { "theme": "dark" } }));
        let sut = MoveStateVersionMigrator::new(7, 8);

        sut.rollback(&helper).await.unwrap();
        sut.update_version(&mut helper, Direction::Down).await.unwrap();

        assert_eq!(
            storage.get("global").await.unwrap(),
            Some(json!({ "theme": "dark", "stateVersion": 7 }))
        );
        assert_eq!(storage.get("stateVersion").await.unwrap(), None);
        assert_eq!(current_version(storage.as_ref()).await.unwrap(), Some(7));
    }
}
