use super::Direction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Raised by `rollback` when a migrator has no safe inverse.
    #[error("Migration is irreversible")]
    Irreversible,

    #[error("No key builder should be used for versions prior to 9. (current version: {version})")]
    UnsupportedKeyBuilder { version: u32 },

    #[error(
        "Migrator '{migrator}' cannot be appended as a {direction} step: expected version {expected}, found {found}"
    )]
    ChainMismatch {
        migrator: String,
        direction: Direction,
        expected: u32,
        found: u32,
    },

    #[error("Migrator '{migrator}' has an invalid version range {from} -> {to}")]
    InvalidVersionRange { migrator: String, from: u32, to: u32 },

    #[error("Version marker missing: {0}")]
    MissingVersionMarker(String),

    #[error(
        "Your local data is too old to be migrated. Your current state version is {current}, but minimum version is {minimum}."
    )]
    UnsupportedStateVersion { current: u32, minimum: u32 },

    #[error("No rollback path from version {from} to {to}")]
    NoRollbackPath { from: u32, to: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl MigrationError {
    pub fn is_irreversible(&self) -> bool {
        matches!(self, Self::Irreversible)
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
