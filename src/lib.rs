// ============================================================================
// State Migrations Library
// ============================================================================

//! Versioned migrations for a persisted key-value client store.
//!
//! A [`MigrationBuilder`] assembles [`Migrator`]s into a chain whose version
//! contiguity is checked as it is built. A [`MigrationRunner`] reads the
//! stored version marker and runs whatever part of the chain is pending,
//! handing each migrator a [`MigrationHelper`] that hides the storage key
//! conventions of each schema era.
//!
//! ```no_run
//! use state_migrations::{MemoryStorage, MigrationConfig, MigrationRunner, create_migration_builder};
//! use std::sync::Arc;
//!
//! # async fn run() -> state_migrations::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! let runner = MigrationRunner::new(storage, MigrationConfig::default());
//! let report = runner.run(&create_migration_builder()?).await?;
//! println!("applied {} migrations", report.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod migration;
pub mod migrations;
pub mod storage;

// Re-export main types for convenience
pub use config::MigrationConfig;
pub use crate::core::{
    AccountEntry, ClientType, Direction, KeyDefinitionLike, MigrationError, MigrationHelperType,
    Result, StateDefinitionLike, UserId,
};
pub use migration::{
    MigrationBuilder, MigrationHelper, MigrationReport, MigrationRunner, Migrator,
    MigratorVersions, StepOutcome, StepState, current_version,
};
pub use migrations::{
    CURRENT_VERSION, MIN_VERSION, create_migration_builder, create_rollback_builder,
    registered_migrators,
};
pub use storage::{JsonFileStorage, MemoryStorage, StorageService};
