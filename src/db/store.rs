use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{InteractionRecord, Judgment, PoolItem, RecentJudgment, UpsertSummary},
};

/// Durable, deduplicated collection of candidate items.
///
/// Every operation is atomic on the backing store; callers never lock around it.
/// Failures are returned with context and never retried here.
#[async_trait::async_trait]
pub trait PoolStore: Send + Sync {
    /// Inserts unseen items and overwrites existing ones, refreshing `fetched_at`.
    ///
    /// An empty batch is a no-op. The batch is applied all-or-nothing.
    async fn upsert_many(&self, items: &[PoolItem]) -> AppResult<UpsertSummary>;

    /// Deletes the oldest items by `fetched_at` until at most `max_size` remain.
    ///
    /// Returns the number of items removed.
    async fn evict_to_max(&self, max_size: u64) -> AppResult<u64>;

    /// Current number of items in the pool
    async fn size(&self) -> AppResult<u64>;

    /// Draws up to `count` items uniformly at random, skipping `exclude`
    async fn sample_excluding(&self, count: usize, exclude: &[i64]) -> AppResult<Vec<PoolItem>>;
}

/// Per-actor like/dislike history consulted by the sampler.
#[async_trait::async_trait]
pub trait InteractionStore: Send + Sync {
    /// Records a judgment as the single record for the (actor, item) pair,
    /// replacing whatever kind was there before.
    ///
    /// Re-judging with the same kind refreshes the timestamp.
    async fn record_judgment(
        &self,
        actor_id: &str,
        item_id: i64,
        kind: Judgment,
    ) -> AppResult<InteractionRecord>;

    /// Items the actor judged with `kind` since `since`, most recent first,
    /// at most `limit` entries.
    async fn recent_judgments(
        &self,
        actor_id: &str,
        kind: Judgment,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RecentJudgment>>;
}
