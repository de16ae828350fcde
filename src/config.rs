//! Harvester configuration file.
//!
//! A JSON document with three optional sections; anything missing keeps its
//! default. Durations are fractional seconds.
//!
//! ```json
//! {
//!   "rate_limit": { "max_calls": 100, "window": 120.0, "max_calls_per_second": 20 },
//!   "retry": { "max_retries": 30, "max_backoff": 120.0, "rate_limit_cooldown": 30.0 },
//!   "collect": { "platforms": ["EUW1", "KR"], "page_limit": 2, "batch_size": 20 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collect::CollectConfig;
use crate::error::HarvestError;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub collect: CollectConfig,
}

impl HarvestConfig {
    /// Read and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HarvestError::Config(format!("reading {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        self.rate_limit.validate()?;
        self.retry.validate()?;
        self.collect.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: HarvestConfig = serde_json::from_str(
            r#"{"rate_limit": {"window": 10.5}, "collect": {"batch_size": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.window, Duration::from_millis(10_500));
        assert_eq!(config.rate_limit.max_calls, 100);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.collect.batch_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_section_rejected() {
        let config: HarvestConfig =
            serde_json::from_str(r#"{"collect": {"max_concurrency": 0}}"#).unwrap();
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));

        let config: HarvestConfig =
            serde_json::from_str(r#"{"collect": {"lookback_days": 4294967295}}"#).unwrap();
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = HarvestConfig::from_file("/nonexistent/harvest.json");
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }
}
