use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Result of one `consume` call. Denial is an ordinary outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Tokens left in the bucket after this call
    pub remaining: u32,
    /// Time until the bucket next gains a token; zero when allowed
    pub retry_after: Duration,
}

/// Per-key token bucket limiter
pub trait RateLimiter: Send + Sync {
    fn consume(&self, key: &str, capacity: u32, window: Duration) -> RateLimitDecision;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Process-local token buckets keyed by `"{action}:{actor}"`
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `consume` with an explicit clock
    pub fn consume_at(
        &self,
        key: &str,
        capacity: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = if window.is_zero() {
            u64::from(capacity)
        } else {
            (elapsed.as_secs_f64() / window.as_secs_f64() * f64::from(capacity)).floor() as u64
        };

        // Partial progress toward the next token is kept by not moving last_refill
        if refill > 0 {
            let refilled = u64::from(bucket.tokens).saturating_add(refill);
            bucket.tokens = refilled.min(u64::from(capacity)) as u32;
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return RateLimitDecision {
                allowed: true,
                remaining: bucket.tokens,
                retry_after: Duration::ZERO,
            };
        }

        let per_token = if capacity == 0 {
            window
        } else {
            window / capacity
        };
        let since_refill = now.saturating_duration_since(bucket.last_refill);

        RateLimitDecision {
            allowed: false,
            remaining: 0,
            retry_after: per_token.saturating_sub(since_refill),
        }
    }

    /// Drops buckets untouched for longer than `idle_ttl`. Returns how many went.
    pub fn sweep_at(&self, idle_ttl: Duration, now: Instant) -> usize {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) <= idle_ttl);
        before - buckets.len()
    }

    pub fn sweep(&self, idle_ttl: Duration) -> usize {
        self.sweep_at(idle_ttl, Instant::now())
    }

    pub fn len(&self) -> usize {
        match self.buckets.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn consume(&self, key: &str, capacity: u32, window: Duration) -> RateLimitDecision {
        self.consume_at(key, capacity, window, Instant::now())
    }
}

/// Handle to the background sweep task
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn shutdown(self) {
        self.task.abort();
        tracing::debug!("Rate limit sweeper stopped");
    }
}

/// Shortest interval the sweeper will run at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically removes idle buckets so the map does not grow without bound.
///
/// Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
pub fn spawn_sweeper(
    limiter: Arc<InMemoryRateLimiter>,
    interval: Duration,
    idle_ttl: Duration,
) -> SweeperHandle {
    if interval < MIN_SWEEP_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            "Rate limit sweep interval too short, using 1s"
        );
    }
    let interval = interval.max(MIN_SWEEP_INTERVAL);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.sweep(idle_ttl);
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.len(), "Swept idle rate limit buckets");
            }
        }
    });

    SweeperHandle { task }
}
