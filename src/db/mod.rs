use std::collections::HashSet;

use crate::models::PoolItem;

pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PostgresStore};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use store::{InteractionStore, PoolStore};

/// Collapses duplicate track ids in a batch, keeping the last occurrence
/// and otherwise preserving input order.
pub(crate) fn dedupe_keep_last(items: &[PoolItem]) -> Vec<&PoolItem> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&PoolItem> = items
        .iter()
        .rev()
        .filter(|item| seen.insert(item.track_id))
        .collect();
    unique.reverse();
    unique
}
