use serde::Serialize;
use std::time::Instant;

use crate::{
    db::PoolStore,
    error::AppResult,
    services::{providers::SourceAdapter, retry::RetryPolicy},
};

/// Outcome of one replenishment run, returned to the scheduler
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplenishReport {
    pub source: &'static str,
    /// Playable items the adapter returned
    pub scanned: u64,
    /// Items new to the pool
    pub added: u64,
    /// Items already pooled and refreshed in place
    pub updated: u64,
    pub evicted: u64,
    pub pool_size: Option<u64>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eviction_error: Option<String>,
}

/// Fetches from one source with retries, upserts the results, then trims the
/// pool back to `max_size`.
///
/// Fetch and upsert failures fail the run. Eviction is best-effort: its failure
/// is logged and reported but the upsert stands.
pub async fn replenish(
    adapter: &dyn SourceAdapter,
    pool: &dyn PoolStore,
    policy: &RetryPolicy,
    max_size: u64,
) -> AppResult<ReplenishReport> {
    let start = Instant::now();
    let source = adapter.name();

    tracing::info!(source, "Starting pool replenishment");

    let items = policy.run(source, || adapter.fetch()).await?;
    let summary = pool.upsert_many(&items).await?;

    let (evicted, eviction_error) = if items.is_empty() {
        (0, None)
    } else {
        match pool.evict_to_max(max_size).await {
            Ok(evicted) => (evicted, None),
            Err(e) => {
                tracing::error!(source, error = %e, "Pool eviction failed");
                (0, Some(e.to_string()))
            }
        }
    };

    let pool_size = match pool.size().await {
        Ok(size) => Some(size),
        Err(e) => {
            tracing::warn!(source, error = %e, "Could not read pool size");
            None
        }
    };

    let report = ReplenishReport {
        source,
        scanned: items.len() as u64,
        added: summary.inserted,
        updated: summary.updated,
        evicted,
        pool_size,
        elapsed_ms: start.elapsed().as_millis() as u64,
        eviction_error,
    };

    tracing::info!(
        source,
        scanned = report.scanned,
        added = report.added,
        updated = report.updated,
        evicted = report.evicted,
        elapsed_ms = report.elapsed_ms,
        "Pool replenishment completed"
    );

    Ok(report)
}
