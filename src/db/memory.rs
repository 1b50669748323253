use chrono::{DateTime, Utc};
use rand::seq::IteratorRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::{
    db::{dedupe_keep_last, InteractionStore, PoolStore},
    error::{AppError, AppResult},
    models::{InteractionRecord, Judgment, PoolItem, RecentJudgment, UpsertSummary},
};

/// Pool entry plus a monotonic sequence that breaks `fetched_at` ties
struct StoredItem {
    item: PoolItem,
    sequence: u64,
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<i64, StoredItem>,
    next_sequence: u64,
    /// One judgment per (actor, item); a new one replaces the old
    interactions: HashMap<(String, i64), (Judgment, DateTime<Utc>)>,
}

/// Process-local implementation of the pool and interaction stores.
///
/// Each operation runs inside one mutex critical section, which gives it the
/// same atomicity the Postgres store gets from transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Store("memory store lock poisoned".to_string()))
    }

    /// Records a judgment at an explicit time
    pub(crate) fn record_judgment_at(
        &self,
        actor_id: &str,
        item_id: i64,
        kind: Judgment,
        at: DateTime<Utc>,
    ) -> AppResult<InteractionRecord> {
        self.lock()?
            .interactions
            .insert((actor_id.to_string(), item_id), (kind, at));
        Ok(InteractionRecord {
            actor_id: actor_id.to_string(),
            item_id,
            kind,
            created_at: at,
        })
    }

    /// All judgments recorded for one actor and item
    #[cfg(test)]
    pub(crate) fn judgments_for(&self, actor_id: &str, item_id: i64) -> AppResult<Vec<Judgment>> {
        let state = self.lock()?;
        Ok(state
            .interactions
            .get(&(actor_id.to_string(), item_id))
            .map(|(kind, _)| *kind)
            .into_iter()
            .collect())
    }

    /// Overrides an item's fetch timestamp
    #[cfg(test)]
    pub(crate) fn set_fetched_at(&self, track_id: i64, fetched_at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.lock()?;
        match state.items.get_mut(&track_id) {
            Some(stored) => {
                stored.item.fetched_at = fetched_at;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("track {}", track_id))),
        }
    }

    /// Identifiers currently in the pool
    #[cfg(test)]
    pub(crate) fn track_ids(&self) -> AppResult<HashSet<i64>> {
        Ok(self.lock()?.items.keys().copied().collect())
    }
}

#[async_trait::async_trait]
impl PoolStore for MemoryStore {
    async fn upsert_many(&self, items: &[PoolItem]) -> AppResult<UpsertSummary> {
        if items.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let now = Utc::now();
        let mut state = self.lock()?;
        let mut summary = UpsertSummary::default();

        for item in dedupe_keep_last(items) {
            let mut item = item.clone();
            item.fetched_at = now;

            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let previous = state
                .items
                .insert(item.track_id, StoredItem { item, sequence });

            if previous.is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        Ok(summary)
    }

    async fn evict_to_max(&self, max_size: u64) -> AppResult<u64> {
        let mut state = self.lock()?;
        let current = state.items.len() as u64;
        if current <= max_size {
            return Ok(0);
        }

        let overflow = (current - max_size) as usize;
        let mut by_age: Vec<(DateTime<Utc>, u64, i64)> = state
            .items
            .values()
            .map(|stored| (stored.item.fetched_at, stored.sequence, stored.item.track_id))
            .collect();
        by_age.sort_unstable();

        for (_, _, track_id) in by_age.into_iter().take(overflow) {
            state.items.remove(&track_id);
        }

        Ok(overflow as u64)
    }

    async fn size(&self) -> AppResult<u64> {
        Ok(self.lock()?.items.len() as u64)
    }

    async fn sample_excluding(&self, count: usize, exclude: &[i64]) -> AppResult<Vec<PoolItem>> {
        let excluded: HashSet<i64> = exclude.iter().copied().collect();
        let state = self.lock()?;

        let mut rng = rand::rng();
        Ok(state
            .items
            .values()
            .filter(|stored| !excluded.contains(&stored.item.track_id))
            .map(|stored| stored.item.clone())
            .choose_multiple(&mut rng, count))
    }
}

#[async_trait::async_trait]
impl InteractionStore for MemoryStore {
    async fn record_judgment(
        &self,
        actor_id: &str,
        item_id: i64,
        kind: Judgment,
    ) -> AppResult<InteractionRecord> {
        self.record_judgment_at(actor_id, item_id, kind, Utc::now())
    }

    async fn recent_judgments(
        &self,
        actor_id: &str,
        kind: Judgment,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RecentJudgment>> {
        let state = self.lock()?;
        let mut recent: Vec<RecentJudgment> = state
            .interactions
            .iter()
            .filter(|((actor, _), (judged_kind, judged_at))| {
                actor == actor_id && *judged_kind == kind && *judged_at >= since
            })
            .map(|((_, item_id), (_, judged_at))| RecentJudgment {
                item_id: *item_id,
                judged_at: *judged_at,
            })
            .collect();

        recent.sort_by(|a, b| b.judged_at.cmp(&a.judged_at));
        recent.truncate(limit);
        Ok(recent)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn make_item(track_id: i64) -> PoolItem {
        PoolItem {
            track_id,
            name: format!("Track {}", track_id),
            artist_name: "Test Artist".to_string(),
            collection_name: None,
            preview_url: format!("https://audio.example/{}.m4a", track_id),
            artwork_url: None,
            detail_url: None,
            genre: None,
            release_date: None,
            source_metadata: None,
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_empty_batch_is_noop() {
        let store = MemoryStore::new();
        let summary = tokio_test::assert_ok!(store.upsert_many(&[]).await);

        assert_eq!(summary, UpsertSummary::default());
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reupsert_never_duplicates() {
        let store = MemoryStore::new();
        let batch: Vec<PoolItem> = (1..=5).map(make_item).collect();

        let first = store.upsert_many(&batch).await.unwrap();
        assert_eq!(first.inserted, 5);

        let mut renamed = make_item(3);
        renamed.name = "Renamed".to_string();
        let second = store
            .upsert_many(&[make_item(1), renamed, make_item(6)])
            .await
            .unwrap();

        assert_eq!(second, UpsertSummary { inserted: 1, updated: 2 });
        assert_eq!(store.size().await.unwrap(), 6);

        let all = store.sample_excluding(100, &[]).await.unwrap();
        let three = all.iter().find(|item| item.track_id == 3).unwrap();
        assert_eq!(three.name, "Renamed");
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_batch_keep_last() {
        let store = MemoryStore::new();
        let mut last = make_item(7);
        last.name = "Last".to_string();

        let summary = store.upsert_many(&[make_item(7), last]).await.unwrap();

        assert_eq!(summary, UpsertSummary { inserted: 1, updated: 0 });
        let items = store.sample_excluding(10, &[]).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Last");
    }

    #[tokio::test]
    async fn test_upsert_refreshes_fetched_at() {
        let store = MemoryStore::new();
        store.upsert_many(&[make_item(1)]).await.unwrap();
        let old = Utc::now() - Duration::days(3);
        store.set_fetched_at(1, old).unwrap();

        store.upsert_many(&[make_item(1)]).await.unwrap();

        let items = store.sample_excluding(1, &[]).await.unwrap();
        assert!(items[0].fetched_at > old);
    }

    #[tokio::test]
    async fn test_evict_removes_oldest_overflow() {
        let store = MemoryStore::new();
        let batch: Vec<PoolItem> = (1..=10).map(make_item).collect();
        store.upsert_many(&batch).await.unwrap();

        let base = Utc::now() - Duration::hours(1);
        for track_id in 1..=10 {
            store
                .set_fetched_at(track_id, base + Duration::minutes(track_id))
                .unwrap();
        }

        let removed = store.evict_to_max(6).await.unwrap();

        assert_eq!(removed, 4);
        assert_eq!(store.size().await.unwrap(), 6);
        let remaining = store.track_ids().unwrap();
        assert_eq!(remaining, (5..=10).collect::<HashSet<i64>>());
    }

    #[tokio::test]
    async fn test_evict_under_limit_removes_nothing() {
        let store = MemoryStore::new();
        let batch: Vec<PoolItem> = (1..=3).map(make_item).collect();
        store.upsert_many(&batch).await.unwrap();

        assert_eq!(store.evict_to_max(3).await.unwrap(), 0);
        assert_eq!(store.evict_to_max(10).await.unwrap(), 0);
        assert_eq!(store.size().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_evict_ties_break_by_insertion_order() {
        let store = MemoryStore::new();
        let batch: Vec<PoolItem> = (1..=4).map(make_item).collect();
        store.upsert_many(&batch).await.unwrap();

        // Same batch shares one timestamp
        store.evict_to_max(2).await.unwrap();

        assert_eq!(store.track_ids().unwrap(), HashSet::from([3, 4]));
    }

    #[tokio::test]
    async fn test_sample_excluding_skips_excluded() {
        let store = MemoryStore::new();
        let batch: Vec<PoolItem> = (1..=20).map(make_item).collect();
        store.upsert_many(&batch).await.unwrap();

        let exclude: Vec<i64> = (1..=15).collect();
        let items = store.sample_excluding(10, &exclude).await.unwrap();

        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|item| item.track_id > 15));
    }

    #[tokio::test]
    async fn test_judgment_flip_leaves_single_record() {
        let store = MemoryStore::new();

        store.record_judgment("alice", 9, Judgment::Like).await.unwrap();
        store.record_judgment("alice", 9, Judgment::Dislike).await.unwrap();
        assert_eq!(store.judgments_for("alice", 9).unwrap(), vec![Judgment::Dislike]);

        store.record_judgment("alice", 9, Judgment::Like).await.unwrap();
        assert_eq!(store.judgments_for("alice", 9).unwrap(), vec![Judgment::Like]);
    }

    #[tokio::test]
    async fn test_recent_judgments_window_and_order() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .record_judgment_at("bob", 1, Judgment::Like, now - Duration::days(1))
            .unwrap();
        store
            .record_judgment_at("bob", 2, Judgment::Like, now - Duration::hours(1))
            .unwrap();
        store
            .record_judgment_at("bob", 3, Judgment::Like, now - Duration::days(10))
            .unwrap();
        store
            .record_judgment_at("carol", 4, Judgment::Like, now)
            .unwrap();

        let recent = store
            .recent_judgments("bob", Judgment::Like, now - Duration::days(7), 10)
            .await
            .unwrap();

        let ids: Vec<i64> = recent.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
