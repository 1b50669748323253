/// Chart feed adapter
///
/// API Flow:
/// 1. Chart: /{country}/music/most-played/{limit}/songs.json → ranked track ids (no previews)
/// 2. Lookup: /lookup?id=... → full catalog records with preview URLs
use reqwest::Client as HttpClient;
use serde_json::json;
use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{CatalogResponse, ChartEntry, ChartFeedResponse, PoolItem, SourceMetadata},
    services::providers::{ensure_success, SourceAdapter},
};

/// Catalog lookups accept a bounded number of ids per request
const LOOKUP_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct ChartAdapter {
    http_client: HttpClient,
    feed_url: String,
    catalog_url: String,
    country: String,
    limit: u32,
}

impl ChartAdapter {
    pub fn new(
        http_client: HttpClient,
        feed_url: String,
        catalog_url: String,
        country: String,
        limit: u32,
    ) -> Self {
        Self {
            http_client,
            feed_url,
            catalog_url,
            country,
            limit,
        }
    }

    fn chart_url(&self) -> String {
        format!(
            "{}/{}/music/most-played/{}/songs.json",
            self.feed_url.trim_end_matches('/'),
            self.country,
            self.limit
        )
    }

    async fn fetch_chart(&self) -> AppResult<Vec<ChartEntry>> {
        let response = self.http_client.get(self.chart_url()).send().await?;
        let response = ensure_success("chart feed", response).await?;
        let chart: ChartFeedResponse = response.json().await?;
        Ok(chart.feed.results)
    }

    async fn lookup(&self, ids: &[i64]) -> AppResult<CatalogResponse> {
        let url = format!("{}/lookup", self.catalog_url.trim_end_matches('/'));
        let id_list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("id", id_list.as_str()),
                ("country", self.country.as_str()),
                ("entity", "song"),
            ])
            .send()
            .await?;
        let response = ensure_success("catalog lookup", response).await?;

        Ok(response.json().await?)
    }

    /// Joins lookup results back to their chart positions and drops anything
    /// that cannot be played.
    fn normalize(&self, ranks: &HashMap<i64, usize>, lookups: Vec<CatalogResponse>) -> Vec<PoolItem> {
        lookups
            .into_iter()
            .flat_map(|response| response.results)
            .filter_map(|track| {
                let rank = track.track_id.and_then(|id| ranks.get(&id)).copied()?;

                let mut metadata = SourceMetadata::new();
                metadata.insert("source".to_string(), json!(self.name()));
                metadata.insert("chart_rank".to_string(), json!(rank));
                metadata.insert("chart_country".to_string(), json!(self.country));

                track.into_pool_item(metadata)
            })
            .collect()
    }
}

/// Maps chart track ids to their 1-based rank, skipping malformed ids
fn rank_entries(entries: &[ChartEntry]) -> HashMap<i64, usize> {
    let mut ranks = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if let Some(id) = entry.track_id() {
            ranks.entry(id).or_insert(index + 1);
        }
    }
    ranks
}

#[async_trait::async_trait]
impl SourceAdapter for ChartAdapter {
    async fn fetch(&self) -> AppResult<Vec<PoolItem>> {
        let entries = self.fetch_chart().await?;
        let ranks = rank_entries(&entries);

        if ranks.is_empty() {
            tracing::warn!(entries = entries.len(), "Chart feed returned no usable ids");
            return Ok(Vec::new());
        }

        let mut ids: Vec<i64> = ranks.keys().copied().collect();
        ids.sort_by_key(|id| ranks[id]);

        let mut lookups = Vec::new();
        for batch in ids.chunks(LOOKUP_BATCH_SIZE) {
            lookups.push(self.lookup(batch).await?);
        }

        let items = self.normalize(&ranks, lookups);

        tracing::info!(
            chart_entries = entries.len(),
            playable = items.len(),
            provider = self.name(),
            "Chart fetch completed"
        );

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "chart"
    }
}
