use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::{InteractionStore, PoolStore},
    models::Judgment,
    services::{
        providers::SourceAdapter, RateLimiter, RetryPolicy, Sampler, SamplerConfig,
    },
};

/// Token bucket parameters for one action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub capacity: u32,
    pub window: Duration,
}

/// Request-independent knobs the handlers need
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub job_secret: String,
    pub pool_max_size: u64,
    pub like_limit: RateLimit,
    pub dislike_limit: RateLimit,
    pub retry_policy: RetryPolicy,
    pub sampler: SamplerConfig,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            job_secret: config.job_secret.clone(),
            pool_max_size: config.pool_max_size,
            like_limit: RateLimit {
                capacity: config.like_rate_capacity,
                window: Duration::from_millis(config.like_rate_window_ms),
            },
            dislike_limit: RateLimit {
                capacity: config.dislike_rate_capacity,
                window: Duration::from_millis(config.dislike_rate_window_ms),
            },
            retry_policy: config.retry_policy(),
            sampler: SamplerConfig {
                like_window: chrono::Duration::days(config.like_exclusion_days),
                dislike_window: chrono::Duration::days(config.dislike_exclusion_days),
                exclusion_cap: config.exclusion_cap,
            },
        }
    }

    pub fn limit_for(&self, kind: Judgment) -> RateLimit {
        match kind {
            Judgment::Like => self.like_limit,
            Judgment::Dislike => self.dislike_limit,
        }
    }
}

/// Shared application state. Every collaborator is injected, so tests can
/// swap in in-memory stores and scripted adapters.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<dyn PoolStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub sampler: Arc<Sampler>,
    pub limiter: Arc<dyn RateLimiter>,
    pub chart: Arc<dyn SourceAdapter>,
    pub artists: Arc<dyn SourceAdapter>,
    pub settings: Arc<ServiceSettings>,
}

impl AppState {
    pub fn new(
        pool: Arc<dyn PoolStore>,
        interactions: Arc<dyn InteractionStore>,
        limiter: Arc<dyn RateLimiter>,
        chart: Arc<dyn SourceAdapter>,
        artists: Arc<dyn SourceAdapter>,
        settings: ServiceSettings,
    ) -> Self {
        let sampler = Sampler::new(pool.clone(), interactions.clone(), settings.sampler.clone());

        Self {
            pool,
            interactions,
            sampler: Arc::new(sampler),
            limiter,
            chart,
            artists,
            settings: Arc::new(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let vars = vec![
            ("JOB_SECRET".to_string(), "s3cret".to_string()),
            ("LIKE_RATE_CAPACITY".to_string(), "5".to_string()),
            ("DISLIKE_RATE_WINDOW_MS".to_string(), "1000".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        let settings = ServiceSettings::from_config(&config);

        assert_eq!(settings.limit_for(Judgment::Like).capacity, 5);
        assert_eq!(
            settings.limit_for(Judgment::Dislike).window,
            Duration::from_secs(1)
        );
        assert_eq!(settings.sampler.like_window, chrono::Duration::days(7));
        assert_eq!(settings.retry_policy.max_attempts, 3);
    }
}
