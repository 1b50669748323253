use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;

/// Free-form provider metadata attached to a pool item.
///
/// Always a JSON object; arrays and primitives are unrepresentable.
pub type SourceMetadata = Map<String, Value>;

/// A candidate track in the recommendation pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolItem {
    /// Provider-assigned stable identifier, unique within the pool
    pub track_id: i64,
    pub name: String,
    pub artist_name: String,
    pub collection_name: Option<String>,
    /// Audio preview URL; items without one never enter the pool
    pub preview_url: String,
    pub artwork_url: Option<String>,
    pub detail_url: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub source_metadata: Option<SourceMetadata>,
    pub fetched_at: DateTime<Utc>,
}

/// Database row for `pool_items`
#[derive(Debug, sqlx::FromRow)]
pub struct PoolItemRow {
    pub track_id: i64,
    pub name: String,
    pub artist_name: String,
    pub collection_name: Option<String>,
    pub preview_url: String,
    pub artwork_url: Option<String>,
    pub detail_url: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub source_metadata: Option<Json<SourceMetadata>>,
    pub fetched_at: DateTime<Utc>,
}

impl From<PoolItemRow> for PoolItem {
    fn from(row: PoolItemRow) -> Self {
        Self {
            track_id: row.track_id,
            name: row.name,
            artist_name: row.artist_name,
            collection_name: row.collection_name,
            preview_url: row.preview_url,
            artwork_url: row.artwork_url,
            detail_url: row.detail_url,
            genre: row.genre,
            release_date: row.release_date,
            source_metadata: row.source_metadata.map(|json| json.0),
            fetched_at: row.fetched_at,
        }
    }
}

/// Counts reported by a batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: u64,
    pub updated: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Parses a provider release date such as `2019-11-29T12:00:00Z` or `2019-11-29`
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_release_date_timestamp() {
        assert_eq!(
            parse_release_date("2019-11-29T12:00:00Z"),
            NaiveDate::from_ymd_opt(2019, 11, 29)
        );
    }

    #[test]
    fn test_parse_release_date_plain_and_invalid() {
        assert_eq!(
            parse_release_date("2001-03-07"),
            NaiveDate::from_ymd_opt(2001, 3, 7)
        );
        assert_eq!(parse_release_date("2001"), None);
        assert_eq!(parse_release_date("not-a-date"), None);
    }

    #[test]
    fn test_row_conversion_unwraps_metadata() {
        let mut metadata = SourceMetadata::new();
        metadata.insert("source".to_string(), json!("chart"));

        let row = PoolItemRow {
            track_id: 42,
            name: "Song".to_string(),
            artist_name: "Artist".to_string(),
            collection_name: None,
            preview_url: "https://audio.example/42.m4a".to_string(),
            artwork_url: None,
            detail_url: None,
            genre: Some("Pop".to_string()),
            release_date: None,
            source_metadata: Some(Json(metadata.clone())),
            fetched_at: Utc::now(),
        };

        let item = PoolItem::from(row);
        assert_eq!(item.track_id, 42);
        assert_eq!(item.source_metadata, Some(metadata));
    }

    #[test]
    fn test_metadata_serializes_as_object() {
        let mut metadata = SourceMetadata::new();
        metadata.insert("chart_rank".to_string(), json!(3));

        let value = serde_json::to_value(Some(metadata)).unwrap();
        assert!(value.is_object());
        assert_eq!(value["chart_rank"], 3);
    }
}
