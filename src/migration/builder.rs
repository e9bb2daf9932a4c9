use super::{MigrationHelper, Migrator, MigratorVersions};
use crate::core::{Direction, MigrationError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Where a single step ended up during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Skipped,
    Migrating,
    Migrated,
    VersionUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub migrator: String,
    pub from_version: u32,
    pub to_version: u32,
    pub direction: Direction,
    pub state: StepState,
}

/// Summary of a successful run. Failed runs return the step's error instead.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepOutcome>,
}

impl MigrationReport {
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            steps: Vec::new(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.state == StepState::VersionUpdated)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.state == StepState::Skipped)
            .count()
    }
}

/// One buffered `(migrator, direction)` pair.
#[derive(Clone)]
pub struct MigrationStep {
    migrator: Arc<dyn Migrator>,
    direction: Direction,
}

impl MigrationStep {
    pub fn migrator(&self) -> &dyn Migrator {
        self.migrator.as_ref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn versions(&self) -> MigratorVersions {
        self.migrator.versions()
    }

    pub fn start_version(&self) -> u32 {
        self.versions().start_version(self.direction)
    }

    pub fn end_version(&self) -> u32 {
        self.versions().end_version(self.direction)
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let versions = self.versions();
        f.debug_struct("MigrationStep")
            .field("migrator", &self.migrator.name())
            .field("from_version", &versions.from)
            .field("to_version", &versions.to)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Ordered, chain-validated list of migration steps.
///
/// Every appended step is checked against the version the builder expects
/// the store to be at once all previous steps have run, so a registered
/// chain with a gap or an overlap fails at construction rather than halfway
/// through a user's data.
#[derive(Debug, Clone)]
pub struct MigrationBuilder {
    current_version: u32,
    steps: Vec<MigrationStep>,
}

impl MigrationBuilder {
    /// Creates an empty builder at baseline version 0.
    pub fn create() -> Self {
        Self::starting_at(0)
    }

    /// Creates an empty builder at an explicit baseline version.
    pub fn starting_at(version: u32) -> Self {
        Self {
            current_version: version,
            steps: Vec::new(),
        }
    }

    /// Version the store is expected to be at after every buffered step.
    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Appends a forward step. The migrator's `from_version` must equal the
    /// tracked version.
    pub fn with<M>(self, migrator: M) -> Result<Self>
    where
        M: Migrator + 'static,
    {
        self.push_step(Arc::new(migrator), Direction::Up)
    }

    /// Appends a rollback step. The migrator's `to_version` must equal the
    /// tracked version.
    pub fn rollback<M>(self, migrator: M) -> Result<Self>
    where
        M: Migrator + 'static,
    {
        self.push_step(Arc::new(migrator), Direction::Down)
    }

    /// Appends an already shared migrator in either direction.
    pub fn push_step(mut self, migrator: Arc<dyn Migrator>, direction: Direction) -> Result<Self> {
        let versions = migrator.versions();
        if versions.from >= versions.to {
            return Err(MigrationError::InvalidVersionRange {
                migrator: migrator.name().to_string(),
                from: versions.from,
                to: versions.to,
            });
        }

        let start = versions.start_version(direction);
        if start != self.current_version {
            return Err(MigrationError::ChainMismatch {
                migrator: migrator.name().to_string(),
                direction,
                expected: self.current_version,
                found: start,
            });
        }

        self.current_version = versions.end_version(direction);
        self.steps.push(MigrationStep {
            migrator,
            direction,
        });
        Ok(self)
    }

    /// Runs every buffered step strictly in order, each fully awaited before
    /// the next starts.
    ///
    /// The first error is returned unchanged. The store is left at whatever
    /// version the last completed step recorded.
    pub async fn migrate(&self, helper: &mut MigrationHelper) -> Result<MigrationReport> {
        self.run_steps(self.steps.iter().collect(), helper).await
    }

    /// Like [`migrate`](Self::migrate), but skips steps the helper's current
    /// version already reflects.
    pub async fn migrate_pending(&self, helper: &mut MigrationHelper) -> Result<MigrationReport> {
        let version = helper.current_version();
        let pending = self
            .steps
            .iter()
            .filter(|step| {
                let versions = step.versions();
                match step.direction {
                    Direction::Up => versions.to > version,
                    Direction::Down => versions.from < version,
                }
            })
            .collect();
        self.run_steps(pending, helper).await
    }

    async fn run_steps(
        &self,
        steps: Vec<&MigrationStep>,
        helper: &mut MigrationHelper,
    ) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(steps.len());

        for step in steps {
            let state = Self::run_step(step, helper).await?;
            let versions = step.versions();
            outcomes.push(StepOutcome {
                migrator: step.migrator.name().to_string(),
                from_version: versions.from,
                to_version: versions.to,
                direction: step.direction,
                state,
            });
        }

        Ok(MigrationReport {
            started_at,
            finished_at: Utc::now(),
            steps: outcomes,
        })
    }

    async fn run_step(step: &MigrationStep, helper: &mut MigrationHelper) -> Result<StepState> {
        let migrator = step.migrator.as_ref();
        let direction = step.direction;
        let to_version = migrator.to_version();

        let should_migrate = migrator.should_migrate(helper, direction).await?;
        info!(
            migrator = migrator.name(),
            to_version,
            %direction,
            should_migrate,
            "migrator should migrate: {}",
            should_migrate
        );
        if !should_migrate {
            return Ok(StepState::Skipped);
        }

        match direction {
            Direction::Up => migrator.migrate(helper).await?,
            Direction::Down => migrator.rollback(helper).await?,
        }
        info!(migrator = migrator.name(), to_version, %direction, "migrated");

        migrator.update_version(helper, direction).await?;
        info!(
            migrator = migrator.name(),
            to_version,
            %direction,
            version = helper.current_version(),
            "updated version"
        );

        Ok(StepState::VersionUpdated)
    }
}
