use crate::core::{
    GLOBAL_ACCOUNTS_MIN_VERSION, KeyDefinitionLike, MigrationError, Result,
    STATE_PROVIDER_MIN_VERSION,
};

/// How versioned accessors turn a [`KeyDefinitionLike`] into a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// Pre-v9: data lives in nested legacy blobs, no key builder exists.
    Legacy { version: u32 },
    /// v9+: flat `global_*` / `user_*` keys.
    StateProvider,
}

impl KeyScheme {
    pub fn for_version(version: u32) -> Self {
        if version < STATE_PROVIDER_MIN_VERSION {
            KeyScheme::Legacy { version }
        } else {
            KeyScheme::StateProvider
        }
    }

    pub fn global_key(&self, key_definition: &KeyDefinitionLike) -> Result<String> {
        match self {
            KeyScheme::Legacy { version } => Err(MigrationError::UnsupportedKeyBuilder {
                version: *version,
            }),
            KeyScheme::StateProvider => Ok(format!(
                "global_{}_{}",
                key_definition.state_name(),
                key_definition.key
            )),
        }
    }

    pub fn user_key(&self, user_id: &str, key_definition: &KeyDefinitionLike) -> Result<String> {
        match self {
            KeyScheme::Legacy { version } => Err(MigrationError::UnsupportedKeyBuilder {
                version: *version,
            }),
            KeyScheme::StateProvider => Ok(format!(
                "user_{}_{}_{}",
                user_id,
                key_definition.state_name(),
                key_definition.key
            )),
        }
    }
}

/// Where the list of known user ids is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountDirectory {
    /// Pre-v60: array of ids at `authenticatedAccounts`.
    AuthenticatedAccounts,
    /// v60+: keys of the map in the global `account.accounts` slot.
    GlobalAccounts,
}

impl AccountDirectory {
    pub fn for_version(version: u32) -> Self {
        if version < GLOBAL_ACCOUNTS_MIN_VERSION {
            AccountDirectory::AuthenticatedAccounts
        } else {
            AccountDirectory::GlobalAccounts
        }
    }
}
