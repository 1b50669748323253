use axum::{extract::State, Json};
use serde::Serialize;

use crate::{error::AppResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct PoolStats {
    pub size: u64,
    pub max_size: u64,
}

/// Handler for pool statistics
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<PoolStats>> {
    let size = state.pool.size().await?;
    Ok(Json(PoolStats {
        size,
        max_size: state.settings.pool_max_size,
    }))
}
