//! Run accounting.

use super::Stage;

/// Outcome of one partition within a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub partition: String,
    /// Work items fetched successfully (pages, leagues, players or matches).
    pub fetched: usize,
    /// Rows inserted (duplicates excluded).
    pub stored: usize,
    /// Work items that failed and were skipped.
    pub failed: usize,
    /// Set when the partition itself could not finish.
    pub error: Option<String>,
}

impl PartitionReport {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            ..Self::default()
        }
    }
}

/// Outcome of one stage across its partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub partitions: Vec<PartitionReport>,
}

impl StageReport {
    pub fn fetched(&self) -> usize {
        self.partitions.iter().map(|p| p.fetched).sum()
    }

    pub fn stored(&self) -> usize {
        self.partitions.iter().map(|p| p.stored).sum()
    }

    pub fn failed(&self) -> usize {
        self.partitions.iter().map(|p| p.failed).sum()
    }

    pub fn partition(&self, name: &str) -> Option<&PartitionReport> {
        self.partitions.iter().find(|p| p.partition == name)
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}
