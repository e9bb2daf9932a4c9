use super::MIN_VERSION;
use crate::core::{Direction, MigrationError, Result};
use crate::migration::{MigrationHelper, Migrator, MigratorVersions};
use async_trait::async_trait;

/// First link of the chain. Refuses stores older than [`MIN_VERSION`].
#[derive(Debug, Clone)]
pub struct MinVersionMigrator {
    versions: MigratorVersions,
}

impl MinVersionMigrator {
    pub fn new() -> Self {
        Self {
            versions: MigratorVersions::new(0, MIN_VERSION),
        }
    }
}

impl Default for MinVersionMigrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Migrator for MinVersionMigrator {
    fn versions(&self) -> MigratorVersions {
        self.versions
    }

    // Any version below the minimum lands here, not only exactly 0.
    async fn should_migrate(&self, helper: &MigrationHelper, _direction: Direction) -> Result<bool> {
        Ok(helper.current_version() < MIN_VERSION)
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()> {
        Err(MigrationError::UnsupportedStateVersion {
            current: helper.current_version(),
            minimum: MIN_VERSION,
        })
    }

    async fn rollback(&self, _helper: &MigrationHelper) -> Result<()> {
        Err(MigrationError::Irreversible)
    }
}
