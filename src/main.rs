//! Command line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use league_harvester::auth::ApiKey;
use league_harvester::collect::{Harvester, RunReport, Stage};
use league_harvester::riot::RiotClient;
use league_harvester::shutdown::ShutdownCoordinator;
use league_harvester::sink::SqliteSink;
use league_harvester::types::{Continent, Platform};
use league_harvester::{HarvestConfig, HarvestError};

/// Collect ranked ladder, match and timeline data from the Riot API.
#[derive(Debug, Parser)]
#[command(name = "league-harvester", version, about)]
struct Cli {
    /// Stages to run, in pipeline order regardless of the order given.
    #[arg(long = "stage", value_delimiter = ',', default_values_t = Stage::ALL)]
    stages: Vec<Stage>,

    /// SQLite database file, created if missing.
    #[arg(long, default_value = "league.db")]
    db: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only these platforms (e.g. EUW1,KR).
    #[arg(long = "platform", value_delimiter = ',')]
    platforms: Vec<Platform>,

    /// Only these continents (e.g. EUROPE).
    #[arg(long = "continent", value_delimiter = ',')]
    continents: Vec<Continent>,

    /// Most ladder pages per tier and division.
    #[arg(long, conflicts_with = "all_pages")]
    page_limit: Option<u32>,

    /// Read ladder pages until an empty one.
    #[arg(long)]
    all_pages: bool,

    /// Rows per sink write.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Work items in flight per partition.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only matches from the last N days.
    #[arg(long)]
    lookback_days: Option<u32>,
}

impl Cli {
    fn harvest_config(&self) -> Result<HarvestConfig, HarvestError> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_file(path)?,
            None => HarvestConfig::default(),
        };

        let collect = &mut config.collect;
        if !self.platforms.is_empty() {
            collect.platforms = self.platforms.clone();
        }
        if !self.continents.is_empty() {
            collect.continents = self.continents.clone();
        }
        if self.all_pages {
            collect.page_limit = None;
        } else if let Some(limit) = self.page_limit {
            collect.page_limit = Some(limit);
        }
        if let Some(batch_size) = self.batch_size {
            collect.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            collect.max_concurrency = concurrency;
        }
        if let Some(days) = self.lookback_days {
            collect.lookback_days = Some(days);
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("league_harvester=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<RunReport, HarvestError> {
    let config = cli.harvest_config()?;
    let api_key = ApiKey::from_env()?;

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received, stopping after flushed batches");
                shutdown.request_shutdown();
            }
        }
    });

    let client = RiotClient::builder()
        .api_key(api_key)
        .rate_limit(config.rate_limit)
        .retry_policy(config.retry)
        .shutdown(shutdown)
        .build()?;
    let sink = Arc::new(SqliteSink::open(&cli.db)?);
    info!(db = %cli.db.display(), "database ready");

    Harvester::new(client, sink, config.collect)?
        .run(&cli.stages)
        .await
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => {
            for stage in &report.stages {
                info!(
                    stage = %stage.stage,
                    fetched = stage.fetched(),
                    stored = stage.stored(),
                    failed = stage.failed(),
                    "done"
                );
            }
        }
        Err(HarvestError::Cancelled) => {
            warn!("run cancelled");
            std::process::exit(130);
        }
        Err(e) => {
            error!("harvest failed: {e}");
            std::process::exit(1);
        }
    }
}
