pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::StorageService;
pub use memory::{MemoryStorage, StorageWrite};
pub use persistence::JsonFileStorage;
