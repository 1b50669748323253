use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::PoolItem,
    middleware::ACTOR_HEADER,
    services::providers::ensure_success,
};

/// Source of fresh queue items for the refill loop
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Fetches the next batch. An empty batch means nothing is left to show.
    async fn fetch(&self) -> AppResult<Vec<PoolItem>>;
}

#[derive(Debug, Deserialize)]
struct SampleResponse {
    items: Vec<PoolItem>,
}

/// Pulls items from a running server's sample endpoint
#[derive(Clone)]
pub struct HttpItemFetcher {
    http_client: HttpClient,
    sample_url: String,
    actor_id: Option<String>,
}

impl HttpItemFetcher {
    pub fn new(http_client: HttpClient, api_base_url: &str, actor_id: Option<String>) -> Self {
        Self {
            http_client,
            sample_url: format!("{}/api/v1/items/sample", api_base_url.trim_end_matches('/')),
            actor_id,
        }
    }
}

#[async_trait::async_trait]
impl ItemFetcher for HttpItemFetcher {
    async fn fetch(&self) -> AppResult<Vec<PoolItem>> {
        // No count: the server default applies
        let mut request = self.http_client.get(&self.sample_url);
        if let Some(actor_id) = &self.actor_id {
            request = request.header(ACTOR_HEADER, actor_id);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let response = ensure_success("sample endpoint", response).await?;
        let body: SampleResponse = response.json().await?;

        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_url_trims_trailing_slash() {
        let fetcher = HttpItemFetcher::new(HttpClient::new(), "http://localhost:3000/", None);
        assert_eq!(fetcher.sample_url, "http://localhost:3000/api/v1/items/sample");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let fetcher = HttpItemFetcher::new(
            HttpClient::new(),
            "http://127.0.0.1:1",
            Some("ana".to_string()),
        );
        assert!(fetcher.fetch().await.is_err());
    }
}
