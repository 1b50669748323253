/// Source adapters that pull candidate tracks from external catalogs.
///
/// Each adapter only fetches, normalizes, and filters. Writing to the pool and
/// retrying are the caller's job (see `services::replenish`), so the retry scope
/// stays limited to the network work done inside `fetch`.
use reqwest::{Client as HttpClient, Response, StatusCode};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::PoolItem,
};

pub mod artist_catalog;
pub mod chart;

pub use artist_catalog::ArtistCatalogAdapter;
pub use chart::ChartAdapter;

const USER_AGENT: &str = concat!("swipe-api/", env!("CARGO_PKG_VERSION"));

/// Trait for pool replenishment sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetches a fresh batch of normalized items. Items without a preview are
    /// never returned.
    async fn fetch(&self) -> AppResult<Vec<PoolItem>>;

    /// Source name for logging and job responses
    fn name(&self) -> &'static str;
}

/// Builds the HTTP client shared by adapters.
///
/// The timeout bounds each request on its own, separate from retry backoff.
pub fn build_http_client(timeout: Duration) -> AppResult<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(AppError::from)
}

/// Maps a non-success provider status to an error. 429 is reported as
/// throttling so it can be told apart in logs; it still takes the retry path.
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::Throttled(format!("{} returned status {}", provider, status))
    } else {
        AppError::ExternalApi(format!(
            "{} returned status {}: {}",
            provider, status, body
        ))
    }
}

/// Passes successful responses through and converts the rest via [`status_error`]
pub async fn ensure_success(provider: &str, response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider, status = %status, "Provider request failed");
    Err(status_error(provider, status, &body))
}
