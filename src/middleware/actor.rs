use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the caller identity. Authentication happens upstream;
/// this service trusts the value it is given.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Caller identity taken from [`ACTOR_HEADER`].
///
/// Required form rejects with 401. Use `Option<ActorId>` where the identity
/// is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId(pub String);

impl ActorId {
    fn from_parts(parts: &Parts) -> Option<Self> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ActorId(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActorId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
            .ok_or_else(|| AppError::Unauthorized("missing actor identity".to_string()))
    }
}
