//! Retrying of fallible API calls.
//!
//! A [`Retrier`] wraps one logical call and re-invokes it according to how
//! each failure is classified:
//!
//! - transient failures (5xx, timeouts, connection errors, truncated bodies)
//!   back off exponentially and share one attempt budget,
//! - `429 Too Many Requests` sleeps a fixed cooldown with its own budget,
//! - cancellation and other client errors are returned immediately.

mod backoff;
mod classify;

pub use backoff::{Backoff, exponential_backoff};
pub use classify::{RetryClass, StatusClassifier};

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSecondsWithFrac, serde_as};
use tracing::{debug, error, warn};

use crate::error::HarvestError;
use crate::shutdown::SharedShutdown;

/// Retry configuration.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts allowed for transient failures.
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
    /// Upper bound of a single backoff sleep.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub max_backoff: Duration,
    /// Randomize backoff sleeps within the envelope.
    pub jitter: bool,
    /// Fixed sleep after a 429.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub rate_limit_cooldown: Duration,
    /// How many 429 cooldowns one call may sleep before giving up.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 30,
            backoff_base: std::f64::consts::E,
            max_backoff: Duration::from_secs(120),
            jitter: true,
            rate_limit_cooldown: Duration::from_secs(30),
            max_rate_limit_retries: 10,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: f64, max_backoff: Duration) -> Self {
        self.backoff_base = base;
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration, max_cooldowns: u32) -> Self {
        self.rate_limit_cooldown = cooldown;
        self.max_rate_limit_retries = max_cooldowns;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.backoff_base,
            max_wait: self.max_backoff,
            jitter: self.jitter,
        }
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.max_retries == 0 {
            return Err(HarvestError::Config("max_retries must be at least 1".into()));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(HarvestError::Config(format!(
                "backoff_base must be a finite number >= 1, got {}",
                self.backoff_base
            )));
        }
        Ok(())
    }
}

/// Re-invokes an operation according to a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    classifier: StatusClassifier,
    shutdown: SharedShutdown,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, shutdown: SharedShutdown) -> Self {
        Self {
            policy,
            classifier: StatusClassifier::default(),
            shutdown,
        }
    }

    pub fn with_classifier(mut self, classifier: StatusClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn shutdown(&self) -> &SharedShutdown {
        &self.shutdown
    }

    /// Run `operation` until it succeeds or a failure is final.
    ///
    /// `label` identifies the call in logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, HarvestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarvestError>>,
    {
        let max_retries = self.policy.max_retries;
        let backoff = self.policy.backoff();
        let mut attempt: u32 = 0;
        let mut cooldowns: u32 = 0;

        loop {
            self.shutdown.check()?;

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 || cooldowns > 0 {
                        debug!(label, attempt, cooldowns, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.classifier.classify(&error) {
                RetryClass::Cancelled => return Err(error),
                RetryClass::Fatal => {
                    warn!(label, attempt, status = ?error.status(), %error, "non-retriable failure");
                    return Err(error);
                }
                RetryClass::RateLimited => {
                    if cooldowns >= self.policy.max_rate_limit_retries {
                        error!(label, cooldowns, "rate limit cooldown budget exhausted");
                        return Err(HarvestError::RateLimitCooldownExhausted {
                            cooldowns,
                            source: Box::new(error),
                        });
                    }
                    cooldowns += 1;
                    warn!(
                        label,
                        attempt,
                        max_retries,
                        remaining = max_retries - attempt,
                        cooldown = cooldowns,
                        wait_secs = self.policy.rate_limit_cooldown.as_secs_f64(),
                        retry_after = ?error.retry_after(),
                        "rate limited, cooling down"
                    );
                    self.shutdown.sleep(self.policy.rate_limit_cooldown).await?;
                }
                RetryClass::Transient => {
                    if attempt + 1 >= max_retries {
                        error!(label, attempts = attempt + 1, max_retries, %error, "max retries exceeded");
                        return Err(HarvestError::RetriesExhausted {
                            attempts: attempt + 1,
                            max_retries,
                            source: Box::new(error),
                        });
                    }
                    let delay = backoff.delay(attempt);
                    warn!(
                        label,
                        attempt,
                        max_retries,
                        remaining = max_retries - attempt - 1,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient failure, backing off"
                    );
                    self.shutdown.sleep(delay).await?;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusError;
    use crate::shutdown::ShutdownCoordinator;

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 30);
        assert_eq!(policy.max_backoff, Duration::from_secs(120));
        assert_eq!(policy.rate_limit_cooldown, Duration::from_secs(30));
        assert!(policy.jitter);
        assert!(policy.validate().is_ok());
        assert!(policy.with_max_retries(0).validate().is_err());
    }

    #[test]
    fn test_policy_deserializes_partial() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 5, "rate_limit_cooldown": 0.25}"#).unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.rate_limit_cooldown, Duration::from_millis(250));
        assert_eq!(policy.max_rate_limit_retries, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient() {
        let retrier = Retrier::new(RetryPolicy::default().with_jitter(false), ShutdownCoordinator::shared());
        let mut calls = 0;
        let result = retrier
            .run("flaky", || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(StatusError::new(502).into())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_budget() {
        let policy = RetryPolicy::default().with_rate_limit_cooldown(Duration::from_secs(1), 2);
        let retrier = Retrier::new(policy, ShutdownCoordinator::shared());
        let mut calls = 0;
        let result: Result<(), _> = retrier
            .run("throttled", || {
                calls += 1;
                async { Err(StatusError::new(429).into()) }
            })
            .await;
        assert!(matches!(result, Err(HarvestError::RateLimitCooldownExhausted { cooldowns: 2, .. })));
        assert_eq!(calls, 3);
    }
}
