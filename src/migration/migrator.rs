use super::MigrationHelper;
use crate::core::{Direction, Result, STATE_VERSION_KEY};
use async_trait::async_trait;

/// Version pair of one migrator, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigratorVersions {
    pub from: u32,
    pub to: u32,
}

impl MigratorVersions {
    pub const fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    /// Version the store must be at for a step in `direction` to apply.
    pub fn start_version(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.from,
            Direction::Down => self.to,
        }
    }

    /// Version recorded after a step in `direction` succeeds.
    pub fn end_version(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Up => self.to,
            Direction::Down => self.from,
        }
    }
}

/// One versioned transform between two schema versions.
///
/// `migrate` must be idempotent: when the data it expects is absent it
/// performs no writes. `rollback` either restores the domain fields changed
/// by `migrate` or fails with [`MigrationError::Irreversible`].
///
/// [`MigrationError::Irreversible`]: crate::MigrationError::Irreversible
#[async_trait]
pub trait Migrator: Send + Sync {
    fn versions(&self) -> MigratorVersions;

    fn from_version(&self) -> u32 {
        self.versions().from
    }

    fn to_version(&self) -> u32 {
        self.versions().to
    }

    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Guard evaluated before the body runs.
    async fn should_migrate(&self, _helper: &MigrationHelper, _direction: Direction) -> Result<bool> {
        Ok(true)
    }

    async fn migrate(&self, helper: &MigrationHelper) -> Result<()>;

    async fn rollback(&self, helper: &MigrationHelper) -> Result<()>;

    /// Record the version reached by a successful step.
    ///
    /// Writes the flat `stateVersion` key. Only the two migrators that move
    /// the marker in or out of the legacy `global` blob override this.
    async fn update_version(&self, helper: &mut MigrationHelper, direction: Direction) -> Result<()> {
        let end_version = self.versions().end_version(direction);
        helper.set_current_version(end_version);
        helper.set(STATE_VERSION_KEY, &end_version).await
    }
}
