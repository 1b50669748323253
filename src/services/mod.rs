pub mod providers;
pub mod rate_limiter;
pub mod replenish;
pub mod retry;
pub mod sampler;

pub use rate_limiter::{spawn_sweeper, InMemoryRateLimiter, RateLimitDecision, RateLimiter, SweeperHandle};
pub use replenish::{replenish, ReplenishReport};
pub use retry::RetryPolicy;
pub use sampler::{clamp_sample_count, Sampler, SamplerConfig};
