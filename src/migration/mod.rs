pub mod builder;
pub mod helper;
pub mod key_scheme;
pub mod migrator;
pub mod runner;

pub use builder::{MigrationBuilder, MigrationReport, MigrationStep, StepOutcome, StepState};
pub use helper::MigrationHelper;
pub use key_scheme::{AccountDirectory, KeyScheme};
pub use migrator::{Migrator, MigratorVersions};
pub use runner::{MigrationRunner, current_version};
