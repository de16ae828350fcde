//! # League Harvester
//!
//! A rate-limited, region-partitioned pipeline that collects ranked ladder,
//! match and timeline data from the Riot Games API into relational tables.
//!
//! ## Features
//!
//! - One dual token bucket (per-window and per-second) per routing value
//! - Retries with capped, jittered exponential backoff and a fixed 429 cooldown
//! - One task per partition with bounded fan-out inside it
//! - Batched, idempotent writes to SQLite or memory
//! - Graceful shutdown on Ctrl+C
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use league_harvester::auth::ApiKey;
//! use league_harvester::collect::{CollectConfig, Harvester, Stage};
//! use league_harvester::riot::RiotClient;
//! use league_harvester::sink::SqliteSink;
//! use league_harvester::types::Platform;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RiotClient::builder().api_key(ApiKey::from_env()?).build()?;
//!     let sink = Arc::new(SqliteSink::open("league.db")?);
//!     let config = CollectConfig::default().with_platforms([Platform::Euw1]);
//!
//!     let report = Harvester::new(client, sink, config)?.run(&Stage::ALL).await?;
//!     for stage in &report.stages {
//!         println!("{}: {} rows", stage.stage, stage.stored());
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod collect;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod riot;
pub mod shutdown;
pub mod sink;
pub mod transform;
pub mod types;

// Re-export commonly used types at crate root
pub use config::HarvestConfig;
pub use error::{HarvestError, StatusError};

/// Result type alias using HarvestError
pub type Result<T> = std::result::Result<T, HarvestError>;
