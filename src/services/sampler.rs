use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::{InteractionStore, PoolStore},
    error::AppResult,
    models::{Judgment, PoolItem, RecentJudgment},
};

pub const DEFAULT_SAMPLE_COUNT: usize = 10;
pub const MAX_SAMPLE_COUNT: usize = 100;

/// Exclusion windows and caps for sampling
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Liked items stay hidden for this long
    pub like_window: Duration,
    /// Disliked items stay hidden for this long
    pub dislike_window: Duration,
    pub exclusion_cap: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            like_window: Duration::days(7),
            dislike_window: Duration::days(30),
            exclusion_cap: 1000,
        }
    }
}

/// Normalizes a requested sample size.
///
/// Anything that is not a positive integer falls back to the default;
/// oversized requests are capped rather than rejected.
pub fn clamp_sample_count(raw: Option<&str>) -> usize {
    match raw.map(str::trim).and_then(|value| value.parse::<i64>().ok()) {
        Some(count) if count > 0 => (count as usize).min(MAX_SAMPLE_COUNT),
        _ => DEFAULT_SAMPLE_COUNT,
    }
}

/// Merges the dislike and like exclusion lists, keeping the most recent
/// judgments when the union exceeds `cap`.
pub fn merge_exclusions(
    dislikes: Vec<RecentJudgment>,
    likes: Vec<RecentJudgment>,
    cap: usize,
) -> Vec<i64> {
    let mut all: Vec<RecentJudgment> = dislikes.into_iter().chain(likes).collect();
    all.sort_by(|a, b| b.judged_at.cmp(&a.judged_at));

    let mut seen = HashSet::new();
    let mut merged: Vec<i64> = all
        .into_iter()
        .map(|judgment| judgment.item_id)
        .filter(|id| seen.insert(*id))
        .collect();

    if merged.len() > cap {
        tracing::warn!(
            excluded = merged.len(),
            cap,
            "Exclusion set over cap, keeping most recent"
        );
        merged.truncate(cap);
    }

    merged
}

/// Random sampling from the pool that hides an actor's recent judgments
pub struct Sampler {
    pool: Arc<dyn PoolStore>,
    interactions: Arc<dyn InteractionStore>,
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(
        pool: Arc<dyn PoolStore>,
        interactions: Arc<dyn InteractionStore>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            pool,
            interactions,
            config,
        }
    }

    /// Builds the exclusion set for one actor
    pub async fn exclusions_for(&self, actor_id: &str) -> AppResult<Vec<i64>> {
        let now = Utc::now();
        let cap = self.config.exclusion_cap;

        let dislikes = self
            .interactions
            .recent_judgments(actor_id, Judgment::Dislike, now - self.config.dislike_window, cap)
            .await?;
        let likes = self
            .interactions
            .recent_judgments(actor_id, Judgment::Like, now - self.config.like_window, cap)
            .await?;

        Ok(merge_exclusions(dislikes, likes, cap))
    }

    /// Draws up to `count` items. An empty result means the pool is exhausted
    /// for this actor; it is not an error.
    pub async fn sample(&self, count: usize, actor_id: Option<&str>) -> AppResult<Vec<PoolItem>> {
        let count = count.clamp(1, MAX_SAMPLE_COUNT);

        let exclude = match actor_id {
            Some(actor) => self.exclusions_for(actor).await?,
            None => Vec::new(),
        };

        let items = self.pool.sample_excluding(count, &exclude).await?;

        tracing::debug!(
            requested = count,
            excluded = exclude.len(),
            returned = items.len(),
            personalized = actor_id.is_some(),
            "Pool sampled"
        );

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::tests::make_item;
    use crate::db::MemoryStore;

    fn judged(item_id: i64, minutes_ago: i64) -> RecentJudgment {
        RecentJudgment {
            item_id,
            judged_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    async fn seeded_sampler(pool_size: i64) -> (Arc<MemoryStore>, Sampler) {
        let store = Arc::new(MemoryStore::new());
        let items: Vec<PoolItem> = (1..=pool_size).map(make_item).collect();
        store.upsert_many(&items).await.unwrap();
        let sampler = Sampler::new(store.clone(), store.clone(), SamplerConfig::default());
        (store, sampler)
    }

    #[test]
    fn test_clamp_sample_count() {
        assert_eq!(clamp_sample_count(None), 10);
        assert_eq!(clamp_sample_count(Some("5")), 5);
        assert_eq!(clamp_sample_count(Some(" 7 ")), 7);
        assert_eq!(clamp_sample_count(Some("100")), 100);
        assert_eq!(clamp_sample_count(Some("101")), 100);
        assert_eq!(clamp_sample_count(Some("0")), 10);
        assert_eq!(clamp_sample_count(Some("-3")), 10);
        assert_eq!(clamp_sample_count(Some("2.5")), 10);
        assert_eq!(clamp_sample_count(Some("lots")), 10);
    }

    #[test]
    fn test_merge_exclusions_dedupes() {
        let merged = merge_exclusions(
            vec![judged(1, 5), judged(2, 10)],
            vec![judged(2, 1), judged(3, 2)],
            100,
        );

        let set: HashSet<i64> = merged.iter().copied().collect();
        assert_eq!(merged.len(), 3);
        assert_eq!(set, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn test_merge_exclusions_truncates_to_most_recent() {
        let merged = merge_exclusions(
            vec![judged(10, 50), judged(11, 1)],
            vec![judged(20, 30), judged(21, 5)],
            2,
        );

        assert_eq!(merged, vec![11, 21]);
    }

    #[tokio::test]
    async fn test_sample_without_actor_draws_from_whole_pool() {
        let (_, sampler) = seeded_sampler(30).await;

        let items = sampler.sample(10, None).await.unwrap();

        assert_eq!(items.len(), 10);
        let unique: HashSet<i64> = items.iter().map(|item| item.track_id).collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn test_sample_never_returns_recent_judgments() {
        let (store, sampler) = seeded_sampler(12).await;
        let now = Utc::now();

        for id in 1..=4 {
            store
                .record_judgment_at("dana", id, Judgment::Dislike, now - Duration::days(20))
                .unwrap();
        }
        for id in 5..=8 {
            store
                .record_judgment_at("dana", id, Judgment::Like, now - Duration::days(2))
                .unwrap();
        }

        for _ in 0..10 {
            let items = sampler.sample(100, Some("dana")).await.unwrap();
            assert_eq!(items.len(), 4);
            assert!(items.iter().all(|item| item.track_id > 8));
        }
    }

    #[tokio::test]
    async fn test_expired_judgments_resurface() {
        let (store, sampler) = seeded_sampler(3).await;
        let now = Utc::now();

        // Liked 8 days ago: outside the 7-day window
        store
            .record_judgment_at("eli", 1, Judgment::Like, now - Duration::days(8))
            .unwrap();
        // Disliked 8 days ago: still inside the 30-day window
        store
            .record_judgment_at("eli", 2, Judgment::Dislike, now - Duration::days(8))
            .unwrap();
        // Disliked 31 days ago: expired
        store
            .record_judgment_at("eli", 3, Judgment::Dislike, now - Duration::days(31))
            .unwrap();

        let items = sampler.sample(10, Some("eli")).await.unwrap();
        let ids: HashSet<i64> = items.iter().map(|item| item.track_id).collect();
        assert_eq!(ids, HashSet::from([1, 3]));
    }

    #[tokio::test]
    async fn test_exclusions_are_per_actor() {
        let (store, sampler) = seeded_sampler(2).await;
        store.record_judgment("fay", 1, Judgment::Dislike).await.unwrap();

        let for_other = sampler.sample(10, Some("gus")).await.unwrap();
        assert_eq!(for_other.len(), 2);

        let for_fay = sampler.sample(10, Some("fay")).await.unwrap();
        assert_eq!(for_fay.len(), 1);
        assert_eq!(for_fay[0].track_id, 2);
    }

    #[tokio::test]
    async fn test_empty_pool_yields_empty_sample() {
        let store = Arc::new(MemoryStore::new());
        let sampler = Sampler::new(store.clone(), store, SamplerConfig::default());

        let items = sampler.sample(5, None).await.unwrap();
        assert!(items.is_empty());

        let items = sampler.sample(5, Some("hal")).await.unwrap();
        assert!(items.is_empty());
    }
}
