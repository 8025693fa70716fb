pub mod redis_store;
pub mod sqlite;

use crate::errors::StoreError;
use std::collections::HashMap;

pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;

/// Durable mapping from listing id to its serialized record.
///
/// Records are opaque strings at this layer; encoding belongs to the domain.
/// Single writer per store is assumed, so get/put per id needs no locking.
pub trait StateStore {
    /// Every stored entry in one batched read.
    fn get_all(&mut self) -> Result<HashMap<String, String>, StoreError>;
    fn get(&mut self, id: &str) -> Result<Option<String>, StoreError>;
    fn put(&mut self, id: &str, record: &str) -> Result<(), StoreError>;
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
}
