//! Request budget for the market-data API.
//!
//! Every outbound read acquires one permit first. The production budget is
//! a governor token bucket; tests substitute a counting budget so the rate
//! contract can be asserted without wall-clock sleeps.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Permit source consulted before each remote call.
#[async_trait]
pub trait RateBudget: Send + Sync {
    /// Wait until a request may be sent.
    async fn acquire(&self);

    /// Permits granted so far.
    fn granted(&self) -> u64;
}

/// Build a quota of one request per `interval`, allowing `burst`
/// back-to-back requests. A zero interval is clamped to 1 ms.
pub fn quota(interval: Duration, burst: u32) -> Quota {
    let interval = interval.max(Duration::from_millis(1));
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    // with_period only fails on a zero duration, excluded above.
    Quota::with_period(interval)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

/// Token bucket backed by governor.
pub struct TokenBucket {
    limiter: DefaultDirectRateLimiter,
    granted: AtomicU64,
}

impl TokenBucket {
    pub fn new(interval: Duration, burst: u32) -> Self {
        Self {
            limiter: RateLimiter::direct(quota(interval, burst)),
            granted: AtomicU64::new(0),
        }
    }

    /// Take a permit without waiting. Returns false when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let ok = self.limiter.check().is_ok();
        if ok {
            self.granted.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }
}

#[async_trait]
impl RateBudget for TokenBucket {
    async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!("Request budget exhausted, waiting for permit");
            self.limiter.until_ready().await;
        }
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}

/// Never waits; counts permits. Used in tests and dry runs.
#[derive(Default)]
pub struct Unmetered {
    granted: AtomicU64,
}

#[async_trait]
impl RateBudget for Unmetered {
    async fn acquire(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_burst() {
        let q = quota(Duration::from_millis(1500), 2);
        assert_eq!(q.burst_size().get(), 2);
        assert_eq!(q.replenish_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_quota_zero_inputs_clamped() {
        let q = quota(Duration::ZERO, 0);
        assert_eq!(q.burst_size().get(), 1);
        assert!(q.replenish_interval() >= Duration::from_millis(1));
    }

    #[test]
    fn test_bucket_allows_burst_then_blocks() {
        let bucket = TokenBucket::new(Duration::from_secs(60), 2);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        assert_eq!(bucket.granted(), 2);
    }

    #[tokio::test]
    async fn test_bucket_acquire_within_burst_is_immediate() {
        let bucket = TokenBucket::new(Duration::from_secs(60), 3);
        let started = std::time::Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(bucket.granted(), 3);
    }

    #[tokio::test]
    async fn test_unmetered_counts() {
        let budget = Unmetered::default();
        for _ in 0..5 {
            budget.acquire().await;
        }
        assert_eq!(budget.granted(), 5);
    }
}
