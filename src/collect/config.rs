//! Collection settings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::HarvestError;
use crate::types::{Continent, Division, MatchType, Platform, Queue, Tier};

/// Longest accepted lookback window, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Which partitions and work items a run covers, and how hard it pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Platforms whose ladders and players are collected.
    pub platforms: Vec<Platform>,
    /// Continents whose matches are collected.
    pub continents: Vec<Continent>,
    pub tiers: Vec<Tier>,
    pub divisions: Vec<Division>,
    pub queue: Queue,
    /// First ladder page requested.
    pub start_page: u32,
    /// Most pages fetched per tier and division; `None` reads until an empty page.
    pub page_limit: Option<u32>,
    /// Rows buffered before a sink write.
    pub batch_size: usize,
    /// Work items in flight per partition.
    pub max_concurrency: usize,
    /// Match type filter for match id queries; `None` requests every type.
    pub match_type: Option<MatchType>,
    /// Match ids requested per player.
    pub match_count: u32,
    /// Only collect matches started within this many days.
    pub lookback_days: Option<u32>,
    /// Look up each player's current tier before storing their match ids.
    pub refresh_tiers: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            platforms: Platform::ALL.to_vec(),
            continents: Continent::ALL.to_vec(),
            tiers: Tier::ALL.to_vec(),
            divisions: Division::ALL.to_vec(),
            queue: Queue::RankedSolo5x5,
            start_page: 1,
            page_limit: Some(2),
            batch_size: 20,
            max_concurrency: 4,
            match_type: Some(MatchType::Ranked),
            match_count: 100,
            lookback_days: Some(10),
            refresh_tiers: true,
        }
    }
}

impl CollectConfig {
    pub fn with_platforms(mut self, platforms: impl Into<Vec<Platform>>) -> Self {
        self.platforms = platforms.into();
        self
    }

    pub fn with_continents(mut self, continents: impl Into<Vec<Continent>>) -> Self {
        self.continents = continents.into();
        self
    }

    pub fn with_tiers(mut self, tiers: impl Into<Vec<Tier>>) -> Self {
        self.tiers = tiers.into();
        self
    }

    pub fn with_divisions(mut self, divisions: impl Into<Vec<Division>>) -> Self {
        self.divisions = divisions.into();
        self
    }

    pub fn with_pages(mut self, start_page: u32, page_limit: Option<u32>) -> Self {
        self.start_page = start_page;
        self.page_limit = page_limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_lookback_days(mut self, days: Option<u32>) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_refresh_tiers(mut self, refresh: bool) -> Self {
        self.refresh_tiers = refresh;
        self
    }

    /// The `startTime` filter for match id queries, in unix seconds.
    ///
    /// A window reaching before the earliest representable date is clamped to it.
    pub fn start_time(&self, now: OffsetDateTime) -> Option<i64> {
        self.lookback_days.map(|days| {
            now.saturating_sub(time::Duration::days(i64::from(days)))
                .unix_timestamp()
        })
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.start_page == 0 {
            return Err(HarvestError::Config("start_page is 1-based".into()));
        }
        if self.page_limit == Some(0) {
            return Err(HarvestError::Config("page_limit must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(HarvestError::Config("batch_size must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(HarvestError::Config("max_concurrency must be positive".into()));
        }
        if let Some(days) = self.lookback_days.filter(|days| *days > MAX_LOOKBACK_DAYS) {
            return Err(HarvestError::Config(format!(
                "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {days}"
            )));
        }
        if !(1..=100).contains(&self.match_count) {
            return Err(HarvestError::Config(format!(
                "match_count must be between 1 and 100, got {}",
                self.match_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_defaults_are_valid() {
        let config = CollectConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.platforms.len(), 14);
        assert_eq!(config.page_limit, Some(2));
        assert_eq!(config.batch_size, 20);
    }

    #[test]
    fn test_validation() {
        assert!(CollectConfig::default().with_batch_size(0).validate().is_err());
        assert!(CollectConfig::default().with_max_concurrency(0).validate().is_err());
        assert!(CollectConfig::default().with_pages(0, None).validate().is_err());
        assert!(CollectConfig::default().with_pages(1, Some(0)).validate().is_err());
    }

    #[test]
    fn test_lookback_days_bounded() {
        let at_bound = CollectConfig::default().with_lookback_days(Some(MAX_LOOKBACK_DAYS));
        assert!(at_bound.validate().is_ok());

        let config: CollectConfig = serde_json::from_str(r#"{"lookback_days": 4294967295}"#).unwrap();
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
        // start_time never panics, even on an unvalidated window
        let start = config.start_time(datetime!(2025-01-11 00:00 UTC)).unwrap();
        assert!(start < 0);
    }

    #[test]
    fn test_start_time() {
        let now = datetime!(2025-01-11 00:00 UTC);
        let config = CollectConfig::default().with_lookback_days(Some(10));
        assert_eq!(config.start_time(now), Some(datetime!(2025-01-01 00:00 UTC).unix_timestamp()));
        assert_eq!(config.with_lookback_days(None).start_time(now), None);
    }

    #[test]
    fn test_deserialize_subset() {
        let config: CollectConfig =
            serde_json::from_str(r#"{"platforms": ["EUW1", "KR"], "tiers": ["CHALLENGER"], "page_limit": null}"#)
                .unwrap();
        assert_eq!(config.platforms, vec![Platform::Euw1, Platform::Kr]);
        assert_eq!(config.tiers, vec![Tier::Challenger]);
        assert_eq!(config.page_limit, None);
        assert_eq!(config.batch_size, 20);
    }
}
