pub mod cache;
pub mod store;

pub use cache::{CacheSnapshot, CacheStore};
pub use store::{DbStore, KeyValueStore, MemoryStore};
