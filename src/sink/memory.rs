//! In-memory sink.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::{MatchRef, PlayerRef, Sink, Table};
use crate::error::HarvestError;
use crate::transform::Record;
use crate::types::{Continent, Platform};

#[derive(Debug, Default)]
struct TableData {
    keys: HashSet<String>,
    rows: Vec<Record>,
}

/// A [`Sink`] that keeps rows in insertion order in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<Table, TableData>>,
}

fn column<'a>(row: &'a Record, name: &str) -> &'a str {
    row.get(name).and_then(|v| v.as_str()).unwrap_or("")
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Table, TableData>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of every row stored in `table`.
    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.lock()
            .get(&table)
            .map(|data| data.rows.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, table: Table) -> usize {
        self.lock().get(&table).map_or(0, |data| data.rows.len())
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }

    fn insert(&self, table: Table, rows: Vec<Record>) -> Result<usize, HarvestError> {
        let keyed = rows
            .into_iter()
            .map(|row| Ok((table.key_of(&row)?, row)))
            .collect::<Result<Vec<_>, HarvestError>>()?;

        let mut tables = self.lock();
        let data = tables.entry(table).or_default();
        let mut inserted = 0;
        for (key, row) in keyed {
            if data.keys.insert(key) {
                data.rows.push(row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Match ids of `continent`, optionally restricted to those with participants.
    fn match_refs(&self, continent: Continent, with_participants: bool) -> Vec<MatchRef> {
        let tables = self.lock();
        let with_rows: HashSet<&str> = tables
            .get(&Table::MatchParticipants)
            .map(|data| data.rows.iter().map(|r| column(r, "match_id")).collect())
            .unwrap_or_default();

        tables
            .get(&Table::MatchIds)
            .map(|data| {
                data.rows
                    .iter()
                    .filter(|r| column(r, "continental_region") == continent.as_str())
                    .filter(|r| !with_participants || with_rows.contains(column(r, "match_id")))
                    .map(|r| MatchRef {
                        match_id: column(r, "match_id").to_string(),
                        tier: column(r, "game_tier").to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Sink for MemorySink {
    async fn upsert(&self, table: Table, rows: Vec<Record>) -> Result<usize, HarvestError> {
        self.insert(table, rows)
    }

    async fn insert_one(&self, table: Table, row: Record) -> Result<bool, HarvestError> {
        let key = table.key_of(&row)?;
        let inserted = self.insert(table, vec![row])? == 1;
        if !inserted {
            warn!(%table, key, "row already exists");
        }
        Ok(inserted)
    }

    async fn players_in(&self, continent: Continent) -> Result<Vec<PlayerRef>, HarvestError> {
        let tables = self.lock();
        let Some(data) = tables.get(&Table::Summoners) else {
            return Ok(Vec::new());
        };
        Ok(data
            .rows
            .iter()
            .filter_map(|r| {
                let platform: Platform = column(r, "local_region").parse().ok()?;
                (platform.continent() == continent).then(|| PlayerRef {
                    puuid: column(r, "puuid").to_string(),
                    platform,
                    tier: column(r, "current_tier").to_string(),
                })
            })
            .collect())
    }

    async fn matches_in(&self, continent: Continent) -> Result<Vec<MatchRef>, HarvestError> {
        Ok(self.match_refs(continent, false))
    }

    async fn matches_with_participants_in(
        &self,
        continent: Continent,
    ) -> Result<Vec<MatchRef>, HarvestError> {
        Ok(self.match_refs(continent, true))
    }

    async fn team_positions(
        &self,
        match_id: &str,
    ) -> Result<HashMap<String, (i64, String)>, HarvestError> {
        let tables = self.lock();
        Ok(tables
            .get(&Table::MatchParticipants)
            .map(|data| {
                data.rows
                    .iter()
                    .filter(|r| column(r, "match_id") == match_id)
                    .map(|r| {
                        let team_id = r.get("team_id").and_then(|v| v.as_i64()).unwrap_or(0);
                        (
                            column(r, "puuid").to_string(),
                            (team_id, column(r, "team_position").to_string()),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
