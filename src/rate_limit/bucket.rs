//! Time-based token buckets.
//!
//! A [`TokenBucket`] refills in whole tokens: `floor(rate * elapsed)` tokens are
//! added and the refill timestamp only advances when at least one token was
//! added, so fractional progress is never lost between calls.
//!
//! A [`DualTokenBucket`] gates a request on two buckets at once: a slow bucket
//! for the long window quota and a fast bucket for the per-second burst.
//!
//! All operations take an explicit `now` so they can be driven by a paused
//! tokio clock in tests.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::HarvestError;

/// Absorbs float error so that `rate * (1 / rate)` counts as one full token.
const REFILL_EPSILON: f64 = 1e-6;

/// A single token bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum number of tokens
    capacity: u32,
    /// Refill rate in tokens per second
    rate: f64,
    /// Currently available tokens
    tokens: u32,
    /// Last time tokens were added
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket holding `initial` tokens (clamped to `capacity`).
    ///
    /// Fails if the capacity is zero or the rate is not a positive finite number.
    pub fn new(capacity: u32, rate: f64, initial: u32, now: Instant) -> Result<Self, HarvestError> {
        if capacity == 0 {
            return Err(HarvestError::Config(
                "token bucket capacity must be positive".into(),
            ));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(HarvestError::Config(format!(
                "token bucket rate must be positive and finite, got {rate}"
            )));
        }

        Ok(Self {
            capacity,
            rate,
            tokens: initial.min(capacity),
            last_refill: now,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Tokens currently committed, without refilling.
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    fn elapsed(&self, now: Instant) -> f64 {
        // saturating: a clock reading before `last_refill` counts as no time passed
        now.saturating_duration_since(self.last_refill)
            .as_secs_f64()
    }

    fn new_tokens(&self, elapsed: f64) -> u32 {
        let earned = (self.rate * elapsed + REFILL_EPSILON).floor();
        if earned <= 0.0 {
            0
        } else if earned >= f64::from(self.capacity) {
            self.capacity
        } else {
            earned as u32
        }
    }

    /// Tokens the bucket would hold at `now`, without committing the refill.
    pub fn projected_tokens(&self, now: Instant) -> u32 {
        let added = self.new_tokens(self.elapsed(now));
        self.tokens.saturating_add(added).min(self.capacity)
    }

    /// Add the tokens earned since the last refill.
    pub fn refill(&mut self, now: Instant) {
        let added = self.new_tokens(self.elapsed(now));
        if added > 0 {
            self.tokens = self.tokens.saturating_add(added).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    pub fn try_take(&mut self) -> bool {
        if self.tokens >= 1 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Time until this bucket holds at least one token. Zero if it already does.
    pub fn time_to_next_token(&self, now: Instant) -> Duration {
        if self.projected_tokens(now) >= 1 {
            return Duration::ZERO;
        }
        let remaining = (1.0 / self.rate - self.elapsed(now)).max(0.0);
        ceil_micros(remaining)
    }
}

/// Round a non-negative number of seconds up to whole microseconds.
fn ceil_micros(secs: f64) -> Duration {
    Duration::from_micros((secs * 1_000_000.0).ceil() as u64)
}

/// Slow and fast buckets guarding one partition.
#[derive(Debug, Clone)]
pub struct DualTokenBucket {
    slow: TokenBucket,
    fast: TokenBucket,
}

impl DualTokenBucket {
    pub fn new(slow: TokenBucket, fast: TokenBucket) -> Self {
        Self { slow, fast }
    }

    pub fn slow(&self) -> &TokenBucket {
        &self.slow
    }

    pub fn fast(&self) -> &TokenBucket {
        &self.fast
    }

    /// Refill both buckets, then take one token from each if both have one.
    ///
    /// When either bucket is empty neither is consumed.
    pub fn allow_request(&mut self, now: Instant) -> bool {
        self.slow.refill(now);
        self.fast.refill(now);

        if self.slow.tokens() >= 1 && self.fast.tokens() >= 1 {
            self.slow.try_take();
            self.fast.try_take();
            true
        } else {
            false
        }
    }

    /// How long to wait until [`allow_request`](Self::allow_request) can succeed.
    pub fn calculate_sleep_time(&self, now: Instant) -> Duration {
        self.slow
            .time_to_next_token(now)
            .max(self.fast.time_to_next_token(now))
    }
}
