//! Collection orchestration.
//!
//! A run executes [`Stage`]s in pipeline order. Each stage spawns one task per
//! partition (a platform for the ladder, a continent for everything else);
//! partitions never wait on each other except through the sink. Inside a
//! partition, work items are fanned out up to
//! [`CollectConfig::max_concurrency`] and handled in order, rows are written
//! through a [`BatchWriter`], and a failing item is logged and skipped.

mod batch;
mod config;
mod ladder;
mod matches;
mod report;

pub use batch::BatchWriter;
pub use config::CollectConfig;
pub use report::{PartitionReport, RunReport, StageReport};

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::HarvestError;
use crate::riot::{HttpTransport, RiotClient, Transport};
use crate::shutdown::SharedShutdown;
use crate::sink::Sink;

/// One step of the pipeline. Later stages read what earlier ones stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Ladder pages to `summoners`, per platform.
    Summoners,
    /// Stored players to `match_ids`, per continent.
    MatchIds,
    /// Stored match ids to `match_teams` and `match_participants`.
    MatchData,
    /// Matches with participants to `match_timeline`.
    Timeline,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Summoners,
        Stage::MatchIds,
        Stage::MatchData,
        Stage::Timeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Summoners => "summoners",
            Stage::MatchIds => "match_ids",
            Stage::MatchData => "match_data",
            Stage::Timeline => "timeline",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| HarvestError::Config(format!("unknown stage: {s}")))
    }
}

/// Runs collection stages against a client and a sink.
pub struct Harvester<S, T = HttpTransport> {
    client: RiotClient<T>,
    sink: Arc<S>,
    config: Arc<CollectConfig>,
}

impl<S, T> Clone for Harvester<S, T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            sink: Arc::clone(&self.sink),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, T> fmt::Debug for Harvester<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvester")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, T> Harvester<S, T>
where
    S: Sink + 'static,
    T: Transport + 'static,
{
    pub fn new(client: RiotClient<T>, sink: Arc<S>, config: CollectConfig) -> Result<Self, HarvestError> {
        config.validate()?;
        Ok(Self {
            client,
            sink,
            config: Arc::new(config),
        })
    }

    pub fn client(&self) -> &RiotClient<T> {
        &self.client
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    fn shutdown(&self) -> &SharedShutdown {
        self.client.shutdown()
    }

    /// Run `stages` in pipeline order, each once.
    ///
    /// Returns [`HarvestError::Cancelled`] as soon as shutdown is requested;
    /// rows already flushed stay stored.
    pub async fn run(&self, stages: &[Stage]) -> Result<RunReport, HarvestError> {
        let mut ordered = stages.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut report = RunReport::default();
        for stage in ordered {
            self.shutdown().check()?;
            let stage_report = self.run_stage(stage).await?;
            info!(
                %stage,
                fetched = stage_report.fetched(),
                stored = stage_report.stored(),
                failed = stage_report.failed(),
                "stage finished"
            );
            report.stages.push(stage_report);
        }
        Ok(report)
    }

    pub async fn run_stage(&self, stage: Stage) -> Result<StageReport, HarvestError> {
        info!(%stage, "stage started");
        match stage {
            Stage::Summoners => {
                let platforms = self.config.platforms.clone();
                self.run_partitions(stage, platforms, |h, platform| async move {
                    h.collect_summoners(platform).await
                })
                .await
            }
            Stage::MatchIds => {
                let continents = self.config.continents.clone();
                self.run_partitions(stage, continents, |h, continent| async move {
                    h.collect_match_ids(continent).await
                })
                .await
            }
            Stage::MatchData => {
                let continents = self.config.continents.clone();
                self.run_partitions(stage, continents, |h, continent| async move {
                    h.collect_match_data(continent).await
                })
                .await
            }
            Stage::Timeline => {
                let continents = self.config.continents.clone();
                self.run_partitions(stage, continents, |h, continent| async move {
                    h.collect_timelines(continent).await
                })
                .await
            }
        }
    }

    /// Spawn one task per partition and gather their reports.
    ///
    /// A partition that fails outright is recorded and the others continue.
    /// Shutdown aborts every task of the stage.
    async fn run_partitions<P, F, Fut>(
        &self,
        stage: Stage,
        partitions: Vec<P>,
        work: F,
    ) -> Result<StageReport, HarvestError>
    where
        P: fmt::Display,
        F: Fn(Self, P) -> Fut,
        Fut: Future<Output = Result<PartitionReport, HarvestError>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for partition in partitions {
            let name = partition.to_string();
            let task = work(self.clone(), partition);
            tasks.spawn(async move { (name, task.await) });
        }

        let shutdown = self.shutdown();
        let mut reports = Vec::with_capacity(tasks.len());
        loop {
            let joined = tokio::select! {
                joined = tasks.join_next() => Some(joined),
                _ = shutdown.wait_for_shutdown() => None,
            };
            let Some(joined) = joined else {
                warn!(%stage, running = tasks.len(), "shutdown requested, aborting partitions");
                tasks.abort_all();
                return Err(HarvestError::Cancelled);
            };

            match joined {
                None => break,
                Some(Ok((_, Ok(report)))) => {
                    info!(
                        %stage,
                        partition = %report.partition,
                        fetched = report.fetched,
                        stored = report.stored,
                        failed = report.failed,
                        "partition finished"
                    );
                    reports.push(report);
                }
                Some(Ok((_, Err(e)))) if e.is_cancelled() => {
                    tasks.abort_all();
                    return Err(e);
                }
                Some(Ok((name, Err(e)))) => {
                    error!(%stage, partition = %name, error = %e, "partition failed");
                    reports.push(PartitionReport {
                        error: Some(e.to_string()),
                        ..PartitionReport::new(name)
                    });
                }
                Some(Err(e)) => {
                    tasks.abort_all();
                    return Err(HarvestError::Task(e.to_string()));
                }
            }
        }

        reports.sort_by(|a, b| a.partition.cmp(&b.partition));
        Ok(StageReport {
            stage,
            partitions: reports,
        })
    }
}

/// Count a failed work item, unless the failure is a cancellation.
fn skip_item(report: &mut PartitionReport, item: &str, error: HarvestError) -> Result<(), HarvestError> {
    if error.is_cancelled() {
        return Err(error);
    }
    warn!(partition = %report.partition, item, error = %error, "work item failed, skipping");
    report.failed += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("summoners".parse::<Stage>().unwrap(), Stage::Summoners);
        assert_eq!("match-ids".parse::<Stage>().unwrap(), Stage::MatchIds);
        assert_eq!("Timeline".parse::<Stage>().unwrap(), Stage::Timeline);
        assert!("matches".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_order_is_pipeline_order() {
        let mut stages = vec![Stage::Timeline, Stage::Summoners, Stage::MatchData, Stage::MatchIds];
        stages.sort();
        assert_eq!(stages, Stage::ALL);
    }

    #[test]
    fn test_skip_item_propagates_cancellation() {
        let mut report = PartitionReport::new("EUW1");
        assert!(skip_item(&mut report, "x", HarvestError::Timeout("slow".into())).is_ok());
        assert_eq!(report.failed, 1);
        assert!(skip_item(&mut report, "y", HarvestError::Cancelled).is_err());
        assert_eq!(report.failed, 1);
    }
}
