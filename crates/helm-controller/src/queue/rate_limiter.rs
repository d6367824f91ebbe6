//! Per-key retry delays for the work queue.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;

/// Default first retry delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Default ceiling for retry delays.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Decides how long a failing key waits before it is retried.
pub trait RateLimiter<K>: Send + Sync {
    /// Record a failure for `key` and return how long to wait before retrying it.
    fn when(&self, key: &K) -> Duration;

    /// Reset the failure history for `key`.
    fn forget(&self, key: &K);

    /// Number of failures recorded for `key` since it was last forgotten.
    fn retries(&self, key: &K) -> u32;
}

/// Exponential backoff tracked per key: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ItemExponentialBackoff<K: Eq + Hash> {
    base: Duration,
    max: Duration,
    failures: DashMap<K, u32>,
}

impl<K: Eq + Hash> ItemExponentialBackoff<K> {
    /// Creates a limiter with the given base delay and ceiling.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: DashMap::new(),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl<K: Eq + Hash> Default for ItemExponentialBackoff<K> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl<K> RateLimiter<K> for ItemExponentialBackoff<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    fn when(&self, key: &K) -> Duration {
        let mut entry = self.failures.entry(key.clone()).or_insert(0);
        let attempt = *entry;
        *entry = attempt.saturating_add(1);
        self.delay_for(attempt)
    }

    fn forget(&self, key: &K) {
        self.failures.remove(key);
    }

    fn retries(&self, key: &K) -> u32 {
        self.failures.get(key).map_or(0, |entry| *entry)
    }
}
