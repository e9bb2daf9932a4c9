pub mod error;
pub mod types;

pub use error::{MigrationError, Result};
pub use types::{
    AUTHENTICATED_ACCOUNTS_KEY, AccountEntry, ClientType, Direction, GLOBAL_ACCOUNTS_MIN_VERSION,
    GLOBAL_KEY, KNOWN_ACCOUNTS, KeyDefinitionLike, MigrationHelperType, STATE_PROVIDER_MIN_VERSION,
    STATE_VERSION_KEY, StateDefinitionLike, UserId,
};
