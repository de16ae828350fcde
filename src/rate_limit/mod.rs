//! Rate limiting for the Riot API.
//!
//! Riot enforces an application quota per routing host, expressed as two
//! windows: a long one (100 calls per 120 seconds for a development key) and a
//! short one (20 calls per second). Every [`Route`](crate::types::Route) gets
//! its own [`DualTokenBucket`] that models both windows.
//!
//! ## Example
//!
//! ```rust
//! use league_harvester::rate_limit::{RateLimitConfig, RegionalRateLimiter};
//! use league_harvester::types::{Platform, Route};
//!
//! let limiter = RegionalRateLimiter::new(Route::all(), &RateLimitConfig::default().with_start_full(true))?;
//! assert!(limiter.allow_request(&Route::Platform(Platform::Euw1))?);
//! # Ok::<(), league_harvester::HarvestError>(())
//! ```

mod bucket;
mod keyed;

pub use bucket::{DualTokenBucket, TokenBucket};
pub use keyed::RegionalRateLimiter;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};
use tokio::time::Instant;

use crate::error::HarvestError;

/// Rate limiter configuration, shared by every partition.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed per long window.
    pub max_calls: u32,
    /// Length of the long window.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub window: Duration,
    /// Calls allowed per second.
    pub max_calls_per_second: u32,
    /// Start buckets at capacity instead of empty.
    pub start_full: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: limits::development::MAX_CALLS,
            window: limits::development::WINDOW,
            max_calls_per_second: limits::development::MAX_CALLS_PER_SECOND,
            start_full: false,
        }
    }
}

impl RateLimitConfig {
    pub fn with_max_calls(mut self, max_calls: u32, window: Duration) -> Self {
        self.max_calls = max_calls;
        self.window = window;
        self
    }

    pub fn with_max_calls_per_second(mut self, per_second: u32) -> Self {
        self.max_calls_per_second = per_second;
        self
    }

    pub fn with_start_full(mut self, start_full: bool) -> Self {
        self.start_full = start_full;
        self
    }

    /// Refill rate of the slow bucket in tokens per second.
    pub fn slow_rate(&self) -> f64 {
        f64::from(self.max_calls) / self.window.as_secs_f64()
    }

    /// Refill rate of the fast bucket in tokens per second.
    pub fn fast_rate(&self) -> f64 {
        f64::from(self.max_calls_per_second)
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.max_calls == 0 {
            return Err(HarvestError::Config("max_calls must be positive".into()));
        }
        if self.window.is_zero() {
            return Err(HarvestError::Config("window must be positive".into()));
        }
        if self.max_calls_per_second == 0 {
            return Err(HarvestError::Config(
                "max_calls_per_second must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Build the bucket pair for one partition.
    pub fn build_bucket(&self, now: Instant) -> Result<DualTokenBucket, HarvestError> {
        self.validate()?;
        let (slow_initial, fast_initial) = if self.start_full {
            (self.max_calls, self.max_calls_per_second)
        } else {
            (0, 0)
        };

        Ok(DualTokenBucket::new(
            TokenBucket::new(self.max_calls, self.slow_rate(), slow_initial, now)?,
            TokenBucket::new(self.max_calls_per_second, self.fast_rate(), fast_initial, now)?,
        ))
    }
}

/// Riot application rate limits.
pub mod limits {
    /// Development key limits.
    pub mod development {
        use std::time::Duration;

        /// Calls per long window.
        pub const MAX_CALLS: u32 = 100;
        /// Long window length.
        pub const WINDOW: Duration = Duration::from_secs(120);
        /// Calls per second.
        pub const MAX_CALLS_PER_SECOND: u32 = 20;
    }
}
