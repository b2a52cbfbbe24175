//! Retry rate limiting.
//!
//! Two limiters combine into the retry delay for a failed key:
//!
//! - [`ExponentialBackoff`]: per-key, doubles on every failure, capped
//! - [`TokenBucket`]: shared across keys, bounds the overall retry rate
//!
//! [`RetryLimiter`] takes the larger of the two.

use nl_config::ReconcileConfig;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff<K> {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: Eq + Hash + Clone> ExponentialBackoff<K> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay for the next retry of `key`; records one more failure.
    pub fn when(&self, key: &K) -> Duration {
        let mut failures = lock(&self.failures);
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);

        let factor = 2u32.checked_pow(exp);
        match factor.and_then(|f| self.base.checked_mul(f)) {
            Some(delay) if delay <= self.max => delay,
            _ => self.max,
        }
    }

    pub fn retries(&self, key: &K) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }

    pub fn forget(&self, key: &K) {
        lock(&self.failures).remove(key);
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket: `qps` refill rate, `burst` capacity.
///
/// Every call reserves one token; when the bucket is empty the returned delay
/// is how long the caller must wait for its token.
#[derive(Debug)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    pub fn reserve(&self) -> Duration {
        let mut state = lock(&self.state);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last).as_secs_f64();
        state.last = now;
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst);
        state.tokens -= 1.0;

        if state.tokens >= 0.0 || self.qps <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.qps)
        }
    }
}

/// The retry limiter used by the work queue.
#[derive(Debug)]
pub struct RetryLimiter<K> {
    backoff: ExponentialBackoff<K>,
    bucket: TokenBucket,
}

impl<K: Eq + Hash + Clone> RetryLimiter<K> {
    pub fn new(backoff: ExponentialBackoff<K>, bucket: TokenBucket) -> Self {
        Self { backoff, bucket }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            ExponentialBackoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_secs(config.backoff_max_secs),
            ),
            TokenBucket::new(config.qps, config.burst),
        )
    }

    pub fn when(&self, key: &K) -> Duration {
        self.backoff.when(key).max(self.bucket.reserve())
    }

    pub fn retries(&self, key: &K) -> u32 {
        self.backoff.retries(key)
    }

    /// Clear the per-key backoff. The shared bucket is unaffected.
    pub fn forget(&self, key: &K) {
        self.backoff.forget(key);
    }
}

impl<K: Eq + Hash + Clone> Default for RetryLimiter<K> {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_doubles_and_caps() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_millis(30));
        let key = "node-a";
        assert_eq!(backoff.when(&key), Duration::from_millis(5));
        assert_eq!(backoff.when(&key), Duration::from_millis(10));
        assert_eq!(backoff.when(&key), Duration::from_millis(20));
        assert_eq!(backoff.when(&key), Duration::from_millis(30));
        assert_eq!(backoff.when(&key), Duration::from_millis(30));
        assert_eq!(backoff.retries(&key), 5);
    }

    #[test]
    fn test_exponential_survives_huge_exponents() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
        for _ in 0..200 {
            assert!(backoff.when(&1u32) <= Duration::from_secs(1000));
        }
        assert_eq!(backoff.when(&1u32), Duration::from_secs(1000));
    }

    #[test]
    fn test_forget_resets_key_only() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_secs(1));
        backoff.when(&"a");
        backoff.when(&"a");
        backoff.when(&"b");
        backoff.forget(&"a");
        assert_eq!(backoff.retries(&"a"), 0);
        assert_eq!(backoff.retries(&"b"), 1);
        assert_eq!(backoff.when(&"a"), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_allows_burst_then_throttles() {
        let bucket = TokenBucket::new(10.0, 2);
        assert_eq!(bucket.reserve(), Duration::ZERO);
        assert_eq!(bucket.reserve(), Duration::ZERO);
        assert_eq!(bucket.reserve(), Duration::from_millis(100));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(bucket.reserve(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_combined_takes_max() {
        let limiter = RetryLimiter::new(
            ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(10)),
            TokenBucket::new(1.0, 1),
        );
        assert_eq!(limiter.when(&"a"), Duration::from_millis(5));
        assert_eq!(limiter.when(&"a"), Duration::from_secs(1));
        limiter.forget(&"a");
        assert_eq!(limiter.retries(&"a"), 0);
    }
}
