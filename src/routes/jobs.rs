use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use subtle::ConstantTimeEq;

use crate::{
    error::{AppError, AppResult},
    services::{providers::SourceAdapter, replenish, ReplenishReport},
    state::AppState,
};

/// Checks the scheduler's bearer credential in constant time
fn authorize(headers: &HeaderMap, secret: &str) -> AppResult<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    let matches: bool = presented.as_bytes().ct_eq(secret.as_bytes()).into();
    if secret.is_empty() || !matches {
        return Err(AppError::Unauthorized("invalid job credential".to_string()));
    }

    Ok(())
}

async fn run_job(
    state: &AppState,
    headers: &HeaderMap,
    adapter: &dyn SourceAdapter,
) -> AppResult<Json<ReplenishReport>> {
    authorize(headers, &state.settings.job_secret)?;

    let report = replenish(
        adapter,
        state.pool.as_ref(),
        &state.settings.retry_policy,
        state.settings.pool_max_size,
    )
    .await
    .inspect_err(|e| tracing::error!(source = adapter.name(), error = %e, "Replenishment job failed"))?;

    Ok(Json(report))
}

pub async fn replenish_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ReplenishReport>> {
    run_job(&state, &headers, state.chart.as_ref()).await
}

pub async fn replenish_artists(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ReplenishReport>> {
    run_job(&state, &headers, state.artists.as_ref()).await
}
