use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    middleware::ActorId,
    models::{InteractionRecord, Judgment, PoolItem},
    services::clamp_sample_count,
    state::AppState,
};

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    /// Kept as text so malformed values clamp to the default instead of rejecting
    count: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub items: Vec<PoolItem>,
}

#[derive(Debug, Serialize)]
pub struct JudgmentResponse {
    pub item_id: i64,
    pub judgment: Judgment,
    pub judged_at: DateTime<Utc>,
}

impl From<InteractionRecord> for JudgmentResponse {
    fn from(record: InteractionRecord) -> Self {
        Self {
            item_id: record.item_id,
            judgment: record.kind,
            judged_at: record.created_at,
        }
    }
}

/// Handler for the sample endpoint. Responses are never cacheable.
pub async fn sample(
    State(state): State<AppState>,
    actor: Option<ActorId>,
    Query(params): Query<SampleQuery>,
) -> Response {
    let count = clamp_sample_count(params.count.as_deref());
    let actor_id = actor.as_ref().map(ActorId::as_str);

    let result = state.sampler.sample(count, actor_id).await.and_then(|items| {
        if items.is_empty() {
            Err(AppError::NotFound("No items available".to_string()))
        } else {
            Ok(Json(SampleResponse { items }))
        }
    });

    let mut response = result.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub async fn like(
    State(state): State<AppState>,
    actor: ActorId,
    body: Bytes,
) -> AppResult<Response> {
    judge(&state, &actor, Judgment::Like, &body).await
}

pub async fn dislike(
    State(state): State<AppState>,
    actor: ActorId,
    body: Bytes,
) -> AppResult<Response> {
    judge(&state, &actor, Judgment::Dislike, &body).await
}

async fn judge(
    state: &AppState,
    actor: &ActorId,
    kind: Judgment,
    body: &[u8],
) -> AppResult<Response> {
    let limit = state.settings.limit_for(kind);
    let key = format!("{}:{}", kind.as_str(), actor.as_str());
    let decision = state.limiter.consume(&key, limit.capacity, limit.window);

    if !decision.allowed {
        tracing::info!(actor = %actor.as_str(), action = kind.as_str(), "Judgment rate limited");
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after.as_secs_f64().ceil().max(1.0) as u64,
        });
    }

    let item_id = parse_item_id(body)?;

    let record = state
        .interactions
        .record_judgment(actor.as_str(), item_id, kind)
        .await?;

    tracing::debug!(actor = %actor.as_str(), item_id, judgment = kind.as_str(), "Judgment recorded");

    Ok((
        [(RATE_LIMIT_REMAINING_HEADER, decision.remaining.to_string())],
        Json(JudgmentResponse::from(record)),
    )
        .into_response())
}

/// Pulls a positive integer `item_id` out of a JSON body
pub fn parse_item_id(body: &[u8]) -> AppResult<i64> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| AppError::InvalidInput("request body must be JSON".to_string()))?;

    payload
        .get("item_id")
        .and_then(Value::as_i64)
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::InvalidInput("item_id must be a positive integer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_id_accepts_positive_integers() {
        assert_eq!(parse_item_id(br#"{"item_id": 42}"#).unwrap(), 42);
    }

    #[test]
    fn test_parse_item_id_rejects_bad_values() {
        for body in [
            &br#"{}"#[..],
            br#"{"item_id": 0}"#,
            br#"{"item_id": -7}"#,
            br#"{"item_id": 1.5}"#,
            br#"{"item_id": "42"}"#,
            br#"{"item_id": null}"#,
            b"not json",
            b"",
        ] {
            assert!(
                matches!(parse_item_id(body), Err(AppError::InvalidInput(_))),
                "accepted {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }
}
