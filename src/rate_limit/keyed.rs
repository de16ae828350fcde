//! Per-partition rate limiting.
//!
//! The key set is fixed at construction. Each key owns its own lock, so a
//! caller waiting on one partition never holds up another.
//!
//! # Example
//!
//! ```rust
//! use league_harvester::rate_limit::{RateLimitConfig, RegionalRateLimiter};
//!
//! let config = RateLimitConfig::default().with_start_full(true);
//! let limiter = RegionalRateLimiter::new(["EUW1", "NA1"], &config)?;
//!
//! assert!(limiter.allow_request(&"EUW1")?);
//! assert!(limiter.allow_request(&"KR").is_err());
//! # Ok::<(), league_harvester::HarvestError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::{DualTokenBucket, RateLimitConfig};
use crate::error::HarvestError;
use crate::shutdown::ShutdownCoordinator;
use crate::types::Route;

/// Dual token buckets keyed by partition.
#[derive(Debug)]
pub struct RegionalRateLimiter<K = Route> {
    buckets: HashMap<K, Mutex<DualTokenBucket>>,
}

impl<K> RegionalRateLimiter<K>
where
    K: Hash + Eq + Display + Debug,
{
    /// Create one bucket pair per key.
    ///
    /// Fails on invalid rates or when the key set is empty.
    pub fn new(
        keys: impl IntoIterator<Item = K>,
        config: &RateLimitConfig,
    ) -> Result<Self, HarvestError> {
        let now = Instant::now();
        let buckets = keys
            .into_iter()
            .map(|key| Ok((key, Mutex::new(config.build_bucket(now)?))))
            .collect::<Result<HashMap<_, _>, HarvestError>>()?;

        if buckets.is_empty() {
            return Err(HarvestError::Config(
                "rate limiter needs at least one partition".into(),
            ));
        }

        Ok(Self { buckets })
    }

    fn lock(&self, key: &K) -> Result<MutexGuard<'_, DualTokenBucket>, HarvestError> {
        let bucket = self
            .buckets
            .get(key)
            .ok_or_else(|| HarvestError::UnknownPartition(key.to_string()))?;
        // Bucket state is plain counters; a panic elsewhere cannot leave it inconsistent.
        Ok(bucket.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Take one token from both buckets of `key` if both have one.
    pub fn allow_request(&self, key: &K) -> Result<bool, HarvestError> {
        Ok(self.lock(key)?.allow_request(Instant::now()))
    }

    /// Time until a request on `key` can be allowed.
    pub fn calculate_sleep_time(&self, key: &K) -> Result<Duration, HarvestError> {
        Ok(self.lock(key)?.calculate_sleep_time(Instant::now()))
    }

    /// Try to acquire a token, returning the wait time on failure.
    ///
    /// Refill, check and sleep-time projection happen under one lock.
    pub fn try_acquire(&self, key: &K) -> Result<Option<Duration>, HarvestError> {
        let now = Instant::now();
        let mut bucket = self.lock(key)?;
        if bucket.allow_request(now) {
            Ok(None)
        } else {
            Ok(Some(bucket.calculate_sleep_time(now)))
        }
    }

    /// Suspend until a token is available on `key`.
    ///
    /// Returns [`HarvestError::Cancelled`] if shutdown is requested while waiting.
    pub async fn acquire(
        &self,
        key: &K,
        shutdown: &ShutdownCoordinator,
    ) -> Result<(), HarvestError> {
        loop {
            match self.try_acquire(key)? {
                None => return Ok(()),
                Some(wait_time) => {
                    trace!(partition = %key, wait_ms = wait_time.as_millis() as u64, "waiting for token");
                    shutdown.sleep(wait_time).await?;
                }
            }
        }
    }

    /// Committed token counts `(slow, fast)` for `key`.
    pub fn tokens(&self, key: &K) -> Result<(u32, u32), HarvestError> {
        let bucket = self.lock(key)?;
        Ok((bucket.slow().tokens(), bucket.fast().tokens()))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &K> {
        self.buckets.keys()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }
}
