use super::{MigrationBuilder, MigrationHelper, MigrationReport};
use crate::config::MigrationConfig;
use crate::core::{GLOBAL_KEY, MigrationError, Result, STATE_VERSION_KEY};
use crate::storage::StorageService;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Reads the version marker: the flat `stateVersion` key first, then the
/// pre-v8 `global.stateVersion` field. `None` means an empty store.
pub async fn current_version(storage: &dyn StorageService) -> Result<Option<u32>> {
    if let Some(version) = storage.get(STATE_VERSION_KEY).await? {
        if let Some(version) = parse_marker(&version, STATE_VERSION_KEY)? {
            return Ok(Some(version));
        }
    }

    // Pre v8
    let nested = storage
        .get(GLOBAL_KEY)
        .await?
        .and_then(|global| global.get(STATE_VERSION_KEY).cloned());
    match nested {
        Some(version) => parse_marker(&version, "global.stateVersion"),
        None => Ok(None),
    }
}

fn parse_marker(value: &Value, location: &str) -> Result<Option<u32>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .and_then(|version| u32::try_from(version).ok())
        .map(Some)
        .ok_or_else(|| {
            MigrationError::MissingVersionMarker(format!(
                "{} holds {} instead of a version number",
                location, value
            ))
        })
}

/// Startup gate: decides whether a chain needs to run and runs it.
pub struct MigrationRunner {
    storage: Arc<dyn StorageService>,
    config: MigrationConfig,
}

impl MigrationRunner {
    pub fn new(storage: Arc<dyn StorageService>, config: MigrationConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub async fn current_version(&self) -> Result<Option<u32>> {
        current_version(self.storage.as_ref()).await
    }

    pub fn helper_at(&self, version: u32) -> MigrationHelper {
        MigrationHelper::new(
            version,
            self.storage.clone(),
            self.config.helper_type.clone(),
            self.config.client_type,
        )
    }

    /// Brings the store up to `builder.current_version()`.
    ///
    /// An empty store is stamped with the target version instead of being
    /// migrated, so a fresh install never replays historical steps. A store
    /// already at or beyond the target is left untouched.
    pub async fn run(&self, builder: &MigrationBuilder) -> Result<MigrationReport> {
        let target_version = builder.current_version();

        let version = match self.current_version().await? {
            None => {
                info!(target_version, "no state version found, assuming empty state");
                self.storage.save(STATE_VERSION_KEY, json!(target_version)).await?;
                return Ok(MigrationReport::empty());
            }
            Some(version) => version,
        };

        if version >= target_version {
            if version > target_version {
                warn!(version, target_version, "stored state is newer than the registered migrations");
            }
            info!(version, "state is up to date");
            return Ok(MigrationReport::empty());
        }

        info!(version, target_version, helper_type = %self.config.helper_type, "migrating state");
        let mut helper = self.helper_at(version);
        builder.migrate_pending(&mut helper).await
    }

    /// Runs a rollback chain down to `builder.current_version()`.
    pub async fn rollback(&self, builder: &MigrationBuilder) -> Result<MigrationReport> {
        let target_version = builder.current_version();
        let version = self.current_version().await?.ok_or_else(|| {
            MigrationError::MissingVersionMarker("cannot roll back a store without a version".into())
        })?;

        if version <= target_version {
            info!(version, target_version, "nothing to roll back");
            return Ok(MigrationReport::empty());
        }

        info!(version, target_version, "rolling back state");
        let mut helper = self.helper_at(version);
        builder.migrate_pending(&mut helper).await
    }

    /// Resolves once the stored marker equals `target`.
    ///
    /// Other subsystems call this before attaching to the store. There is no
    /// timeout: a migration that never finishes keeps them waiting.
    pub async fn wait_for_migrations(&self, target: u32) -> Result<()> {
        loop {
            if self.current_version().await? == Some(target) {
                return Ok(());
            }
            sleep(self.config.poll_interval).await;
        }
    }
}
