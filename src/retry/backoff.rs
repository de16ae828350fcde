//! Exponential backoff with optional full jitter.

use std::time::Duration;

use rand::Rng;

/// Compute the delay before retry number `attempt` (0-based).
///
/// The envelope is `min(max_wait, base^attempt)` seconds. With `jitter` the
/// delay is drawn uniformly from `[0, envelope]`.
pub fn exponential_backoff<R: Rng + ?Sized>(
    base: f64,
    max_wait: Duration,
    attempt: u32,
    jitter: bool,
    rng: &mut R,
) -> Duration {
    let raw = envelope(base, max_wait, attempt);
    if jitter && raw > 0.0 {
        Duration::from_secs_f64(rng.gen_range(0.0..=raw))
    } else {
        Duration::from_secs_f64(raw)
    }
}

fn envelope(base: f64, max_wait: Duration, attempt: u32) -> f64 {
    let cap = max_wait.as_secs_f64();
    let grown = base.powf(f64::from(attempt));
    if grown.is_finite() { grown.min(cap).max(0.0) } else { cap }
}

/// Backoff parameters for the retrier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: f64,
    pub max_wait: Duration,
    pub jitter: bool,
}

impl Backoff {
    /// Upper bound of the delay for `attempt`.
    pub fn envelope(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(envelope(self.base, self.max_wait, attempt))
    }

    /// Delay for `attempt` using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        exponential_backoff(self.base, self.max_wait, attempt, self.jitter, rng)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: std::f64::consts::E,
            max_wait: Duration::from_secs(120),
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_without_jitter_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        let max = Duration::from_secs(120);
        assert_eq!(exponential_backoff(2.0, max, 0, false, &mut rng), Duration::from_secs(1));
        assert_eq!(exponential_backoff(2.0, max, 3, false, &mut rng), Duration::from_secs(8));
        assert_eq!(exponential_backoff(2.0, max, 10, false, &mut rng), max);
    }

    #[test]
    fn test_jitter_stays_within_envelope() {
        let mut rng = StdRng::seed_from_u64(42);
        let backoff = Backoff::default();
        for attempt in 0..40 {
            let upper = backoff.envelope(attempt);
            for _ in 0..50 {
                let delay = backoff.delay_with(attempt, &mut rng);
                assert!(delay <= upper, "attempt {attempt}: {delay:?} > {upper:?}");
            }
        }
    }

    #[test]
    fn test_envelope_is_non_decreasing_and_capped() {
        let backoff = Backoff::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..2000 {
            let current = backoff.envelope(attempt);
            assert!(current >= previous);
            assert!(current <= backoff.max_wait);
            previous = current;
        }
    }
}
