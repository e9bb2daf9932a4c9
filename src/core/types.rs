use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub type UserId = String;

/// Key of the flat version marker (v8 and later).
pub const STATE_VERSION_KEY: &str = "stateVersion";

/// Key of the legacy global blob. Pre-v8 stores keep the version marker at
/// `global.stateVersion`.
pub const GLOBAL_KEY: &str = "global";

/// Pre-v60 list of user ids.
pub const AUTHENTICATED_ACCOUNTS_KEY: &str = "authenticatedAccounts";

/// First version whose data uses the flat `global_*` / `user_*` key layout.
pub const STATE_PROVIDER_MIN_VERSION: u32 = 9;

/// First version whose known accounts live in the global `account.accounts` slot.
pub const GLOBAL_ACCOUNTS_MIN_VERSION: u32 = 60;

/// Global slot holding the map of known accounts from v60 onward.
pub const KNOWN_ACCOUNTS: KeyDefinitionLike = KeyDefinitionLike::new("account", "accounts");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// The embedding client. Some migrations only make sense on a subset of clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Web,
    Browser,
    Desktop,
    Cli,
    Mobile,
}

impl ClientType {
    pub const ALL: [ClientType; 5] = [
        ClientType::Web,
        ClientType::Browser,
        ClientType::Desktop,
        ClientType::Cli,
        ClientType::Mobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Web => "web",
            ClientType::Browser => "browser",
            ClientType::Desktop => "desktop",
            ClientType::Cli => "cli",
            ClientType::Mobile => "mobile",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ClientType::ALL
            .into_iter()
            .find(|client| client.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown client type '{}'", s))
    }
}

/// Distinguishes physically separate migration passes over the same schema
/// version, e.g. a separate local-storage partition on web clients.
///
/// An open string: new partition kinds need no new variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationHelperType(Cow<'static, str>);

impl MigrationHelperType {
    pub const GENERAL: MigrationHelperType = MigrationHelperType(Cow::Borrowed("general"));
    pub const WEB_DISK_LOCAL: MigrationHelperType =
        MigrationHelperType(Cow::Borrowed("web-disk-local"));

    pub fn new(kind: impl Into<String>) -> Self {
        Self(Cow::Owned(kind.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MigrationHelperType {
    fn default() -> Self {
        Self::GENERAL
    }
}

impl fmt::Display for MigrationHelperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MigrationHelperType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("Migration helper type must not be empty".to_string());
        }
        Ok(Self::new(s.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDefinitionLike {
    pub name: Cow<'static, str>,
}

/// Names one logical state slot. Combined with a user id (or not) it yields
/// a flat storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDefinitionLike {
    pub state_definition: StateDefinitionLike,
    pub key: Cow<'static, str>,
}

impl KeyDefinitionLike {
    pub const fn new(state_name: &'static str, key: &'static str) -> Self {
        Self {
            state_definition: StateDefinitionLike {
                name: Cow::Borrowed(state_name),
            },
            key: Cow::Borrowed(key),
        }
    }

    pub fn owned(state_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            state_definition: StateDefinitionLike {
                name: Cow::Owned(state_name.into()),
            },
            key: Cow::Owned(key.into()),
        }
    }

    pub fn state_name(&self) -> &str {
        &self.state_definition.name
    }
}

/// A known user together with their legacy account blob, if one is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntry<T> {
    pub user_id: UserId,
    pub account: Option<T>,
}
