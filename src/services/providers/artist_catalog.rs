/// Artist-catalog adapter
///
/// Searches the catalog for songs by each configured seed artist and keeps the
/// results whose artist actually matches the seed. Search responses are cached
/// in Redis, so repeated replenishment runs within the TTL cost no provider calls.
use reqwest::Client as HttpClient;
use serde_json::json;
use std::collections::HashSet;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{CatalogResponse, CatalogTrack, PoolItem, SourceMetadata},
    services::providers::{ensure_success, SourceAdapter},
};

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour

#[derive(Clone)]
pub struct ArtistCatalogAdapter {
    http_client: HttpClient,
    catalog_url: String,
    country: String,
    seed_artists: Vec<String>,
    limit: u32,
    cache: Cache,
}

impl ArtistCatalogAdapter {
    pub fn new(
        http_client: HttpClient,
        cache: Cache,
        catalog_url: String,
        country: String,
        seed_artists: Vec<String>,
        limit: u32,
    ) -> Self {
        let seed_artists = seed_artists
            .into_iter()
            .map(|artist| artist.trim().to_string())
            .filter(|artist| !artist.is_empty())
            .collect();

        Self {
            http_client,
            catalog_url,
            country,
            seed_artists,
            limit,
            cache,
        }
    }

    /// Song search for one artist, served from cache when possible
    async fn search_artist(&self, term: &str) -> AppResult<Vec<CatalogTrack>> {
        let key = CacheKey::ArtistSearch {
            term: term.to_string(),
            country: self.country.clone(),
            limit: self.limit,
        };

        cached!(self.cache, key, SEARCH_CACHE_TTL, async move {
            let url = format!("{}/search", self.catalog_url.trim_end_matches('/'));
            let limit = self.limit.to_string();

            let response = self
                .http_client
                .get(&url)
                .query(&[
                    ("term", term),
                    ("country", self.country.as_str()),
                    ("media", "music"),
                    ("entity", "song"),
                    ("attribute", "artistTerm"),
                    ("limit", limit.as_str()),
                ])
                .send()
                .await?;
            let response = ensure_success("catalog search", response).await?;
            let results: CatalogResponse = response.json().await?;

            tracing::debug!(
                artist = %term,
                results = results.results.len(),
                provider = "artist_catalog",
                "Artist search completed"
            );

            Ok::<_, AppError>(results.results)
        })
    }

    /// Keeps playable tracks by the searched artist, tagging where they came from
    fn normalize(&self, seed: &str, tracks: Vec<CatalogTrack>) -> Vec<PoolItem> {
        let wanted = seed.to_lowercase();

        tracks
            .into_iter()
            .filter(|track| {
                track
                    .artist_name
                    .as_deref()
                    .map(|name| name.to_lowercase().contains(&wanted))
                    .unwrap_or(false)
            })
            .filter_map(|track| {
                let mut metadata = SourceMetadata::new();
                metadata.insert("source".to_string(), json!(self.name()));
                metadata.insert("seed_artist".to_string(), json!(seed));
                track.into_pool_item(metadata)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ArtistCatalogAdapter {
    async fn fetch(&self) -> AppResult<Vec<PoolItem>> {
        if self.seed_artists.is_empty() {
            tracing::warn!("No seed artists configured, nothing to fetch");
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut failed = 0usize;

        for seed in &self.seed_artists {
            match self.search_artist(seed).await {
                Ok(tracks) => {
                    for item in self.normalize(seed, tracks) {
                        if seen.insert(item.track_id) {
                            items.push(item);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(artist = %seed, error = %e, "Artist search failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        // Partial results are still useful; only a total wipe-out is a failure
        if failed == self.seed_artists.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        tracing::info!(
            artists = self.seed_artists.len(),
            failed,
            playable = items.len(),
            provider = self.name(),
            "Artist catalog fetch completed"
        );

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "artist_catalog"
    }
}
