use crate::core::{ClientType, MigrationHelperType};
use std::time::Duration;

/// Settings for one migration run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Client embedding the store; some migrators branch on it
    pub client_type: ClientType,

    /// Storage partition this pass runs over
    pub helper_type: MigrationHelperType,

    /// How often `wait_for_migrations` re-reads the version marker
    pub poll_interval: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new(ClientType::default())
    }
}

impl MigrationConfig {
    /// Create a configuration for the given client
    pub fn new(client_type: ClientType) -> Self {
        Self {
            client_type,
            helper_type: MigrationHelperType::GENERAL,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Set the storage partition
    pub fn helper_type(mut self, helper_type: MigrationHelperType) -> Self {
        self.helper_type = helper_type;
        self
    }

    /// Set the marker polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
