use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod interaction;
pub mod item;

pub use interaction::{InteractionRecord, Judgment, RecentJudgment};
pub use item::{parse_release_date, PoolItem, PoolItemRow, SourceMetadata, UpsertSummary};

// ============================================================================
// Catalog API Types (search / lookup)
// ============================================================================

/// Envelope returned by the catalog search and lookup endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub results: Vec<CatalogTrack>,
}

/// A single catalog result. Lookups also return artist and collection wrappers,
/// so almost everything is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    #[serde(default)]
    pub wrapper_type: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub track_id: Option<i64>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artwork_url100: Option<String>,
    #[serde(default)]
    pub track_view_url: Option<String>,
    #[serde(default)]
    pub primary_genre_name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub artist_id: Option<i64>,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub track_time_millis: Option<i64>,
}

impl CatalogTrack {
    /// Converts a catalog result into a pool item.
    ///
    /// Returns `None` for non-track wrappers and for tracks without a preview URL,
    /// name, or artist.
    pub fn into_pool_item(self, mut metadata: SourceMetadata) -> Option<PoolItem> {
        if let Some(wrapper) = &self.wrapper_type {
            if wrapper != "track" {
                return None;
            }
        }

        let track_id = self.track_id.filter(|id| *id > 0)?;
        let preview_url = self.preview_url.filter(|url| !url.trim().is_empty())?;
        let name = self.track_name?;
        let artist_name = self.artist_name?;

        if let Some(artist_id) = self.artist_id {
            metadata.insert("artist_id".to_string(), json!(artist_id));
        }
        if let Some(collection_id) = self.collection_id {
            metadata.insert("collection_id".to_string(), json!(collection_id));
        }
        if let Some(duration) = self.track_time_millis {
            metadata.insert("duration_ms".to_string(), json!(duration));
        }

        Some(PoolItem {
            track_id,
            name,
            artist_name,
            collection_name: self.collection_name,
            preview_url,
            artwork_url: self.artwork_url100,
            detail_url: self.track_view_url,
            genre: self.primary_genre_name,
            release_date: self.release_date.as_deref().and_then(parse_release_date),
            source_metadata: Some(metadata),
            fetched_at: Utc::now(),
        })
    }
}

// ============================================================================
// Chart Feed Types
// ============================================================================

/// Top-level chart feed document
#[derive(Debug, Clone, Deserialize)]
pub struct ChartFeedResponse {
    pub feed: ChartFeed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartFeed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub results: Vec<ChartEntry>,
}

/// One chart position. Chart entries carry no preview, so they are resolved
/// through a catalog lookup before entering the pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
}

impl ChartEntry {
    pub fn track_id(&self) -> Option<i64> {
        self.id.parse::<i64>().ok().filter(|id| *id > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_json() -> &'static str {
        r#"{
            "wrapperType": "track",
            "kind": "song",
            "artistId": 657515,
            "collectionId": 1097861387,
            "trackId": 1097862703,
            "artistName": "Radiohead",
            "collectionName": "A Moon Shaped Pool",
            "trackName": "Daydreaming",
            "trackViewUrl": "https://music.apple.com/us/album/daydreaming/1097861387?i=1097862703",
            "previewUrl": "https://audio-ssl.itunes.apple.com/preview.m4a",
            "artworkUrl100": "https://is1-ssl.mzstatic.com/100x100bb.jpg",
            "releaseDate": "2016-05-06T12:00:00Z",
            "trackTimeMillis": 384000,
            "primaryGenreName": "Alternative"
        }"#
    }

    #[test]
    fn test_catalog_track_deserialization() {
        let track: CatalogTrack = serde_json::from_str(track_json()).unwrap();
        assert_eq!(track.track_id, Some(1097862703));
        assert_eq!(track.track_name.as_deref(), Some("Daydreaming"));
        assert_eq!(track.primary_genre_name.as_deref(), Some("Alternative"));
    }

    #[test]
    fn test_into_pool_item_maps_fields() {
        let track: CatalogTrack = serde_json::from_str(track_json()).unwrap();
        let mut metadata = SourceMetadata::new();
        metadata.insert("source".to_string(), json!("artist"));

        let item = track.into_pool_item(metadata).unwrap();

        assert_eq!(item.track_id, 1097862703);
        assert_eq!(item.artist_name, "Radiohead");
        assert_eq!(item.collection_name.as_deref(), Some("A Moon Shaped Pool"));
        assert_eq!(item.release_date.unwrap().to_string(), "2016-05-06");
        let metadata = item.source_metadata.unwrap();
        assert_eq!(metadata["source"], "artist");
        assert_eq!(metadata["artist_id"], 657515);
        assert_eq!(metadata["duration_ms"], 384000);
    }

    #[test]
    fn test_into_pool_item_drops_missing_preview() {
        let mut track: CatalogTrack = serde_json::from_str(track_json()).unwrap();
        track.preview_url = None;
        assert!(track.into_pool_item(SourceMetadata::new()).is_none());

        let mut blank: CatalogTrack = serde_json::from_str(track_json()).unwrap();
        blank.preview_url = Some("  ".to_string());
        assert!(blank.into_pool_item(SourceMetadata::new()).is_none());
    }

    #[test]
    fn test_into_pool_item_drops_non_track_wrappers() {
        let json = r#"{"wrapperType": "collection", "collectionId": 1, "artistName": "X"}"#;
        let collection: CatalogTrack = serde_json::from_str(json).unwrap();
        assert!(collection.into_pool_item(SourceMetadata::new()).is_none());
    }

    #[test]
    fn test_chart_feed_deserialization() {
        let json = r#"{
            "feed": {
                "title": "Top Songs",
                "results": [
                    {"id": "1440818839", "name": "Song A", "artistName": "Artist A", "kind": "songs"},
                    {"id": "not-a-number", "name": "Song B", "artistName": "Artist B"}
                ]
            }
        }"#;

        let response: ChartFeedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.feed.results.len(), 2);
        assert_eq!(response.feed.results[0].track_id(), Some(1440818839));
        assert_eq!(response.feed.results[1].track_id(), None);
    }
}
