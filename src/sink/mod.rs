//! Persistence of harvested rows.
//!
//! A [`Sink`] stores rows with insert-or-ignore semantics: a row whose
//! primary key already exists is silently dropped. Sinks also answer the
//! work-set queries that drive the later collection stages.

mod memory;
mod sqlite;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;

use crate::error::HarvestError;
use crate::transform::Record;
use crate::types::{Continent, Platform};

/// The tables written by the harvester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Summoners,
    MatchIds,
    MatchTeams,
    MatchParticipants,
    MatchTimeline,
}

/// SQL column types.
const TEXT: &str = "TEXT";
const INTEGER: &str = "INTEGER";
const REAL: &str = "REAL";

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Summoners,
        Table::MatchIds,
        Table::MatchTeams,
        Table::MatchParticipants,
        Table::MatchTimeline,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Summoners => "summoners",
            Table::MatchIds => "match_ids",
            Table::MatchTeams => "match_teams",
            Table::MatchParticipants => "match_participants",
            Table::MatchTimeline => "match_timeline",
        }
    }

    pub fn primary_key(&self) -> &'static [&'static str] {
        match self {
            Table::Summoners => &["puuid"],
            Table::MatchIds => &["match_id"],
            Table::MatchTeams => &["match_id", "team_id"],
            Table::MatchParticipants => &["puuid", "match_id"],
            Table::MatchTimeline => &["match_id", "puuid", "timestamp", "event", "type"],
        }
    }

    /// Column names and SQL types, in table order.
    pub fn columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Table::Summoners => &[
                ("puuid", TEXT),
                ("continental_region", TEXT),
                ("local_region", TEXT),
                ("current_tier", TEXT),
                ("current_division", TEXT),
                ("date_collected", TEXT),
            ],
            Table::MatchIds => &[
                ("match_id", TEXT),
                ("puuid", TEXT),
                ("game_tier", TEXT),
                ("continental_region", TEXT),
                ("date_collected", TEXT),
            ],
            Table::MatchTeams => &[
                ("match_id", TEXT),
                ("team_id", INTEGER),
                ("killed_atakhan", INTEGER),
                ("baron_kills", INTEGER),
                ("champion_kills", INTEGER),
                ("dragon_kills", INTEGER),
                ("dragon_soul", INTEGER),
                ("horde_kills", INTEGER),
                ("rift_herald_kills", INTEGER),
                ("tower_kills", INTEGER),
                ("team_win", INTEGER),
                ("end_of_game_result", TEXT),
                ("game_tier", TEXT),
            ],
            Table::MatchParticipants => &[
                ("puuid", TEXT),
                ("match_id", TEXT),
                ("team_id", INTEGER),
                ("game_tier", TEXT),
                ("champion_kills", INTEGER),
                ("assists", INTEGER),
                ("deaths", INTEGER),
                ("kda", REAL),
                ("gold_earned", INTEGER),
                ("gold_per_minute", REAL),
                ("total_minions_killed", INTEGER),
                ("max_level_lead_lane_opponent", INTEGER),
                ("lane_minions_first_10_minutes", INTEGER),
                ("damage_per_minute", REAL),
                ("kill_participation", REAL),
                ("control_wards_placed", INTEGER),
                ("wards_placed", INTEGER),
                ("wards_killed", INTEGER),
                ("vision_score", INTEGER),
                ("vision_wards_bought", INTEGER),
                ("assist_me_pings", INTEGER),
                ("all_in_pings", INTEGER),
                ("enemy_missing_pings", INTEGER),
                ("need_vision_pings", INTEGER),
                ("on_my_way_pings", INTEGER),
                ("get_back_pings", INTEGER),
                ("push_pings", INTEGER),
                ("hold_pings", INTEGER),
                ("champion_name", TEXT),
                ("individual_position", TEXT),
                ("team_position", TEXT),
                ("had_open_nexus", INTEGER),
                ("win", INTEGER),
                ("end_of_game_result", TEXT),
            ],
            Table::MatchTimeline => &[
                ("match_id", TEXT),
                ("puuid", TEXT),
                ("timestamp", INTEGER),
                ("team_id", INTEGER),
                ("in_game_id", INTEGER),
                ("team_position", TEXT),
                ("x", INTEGER),
                ("y", INTEGER),
                ("event", TEXT),
                ("type", TEXT),
            ],
        }
    }

    /// The primary-key values of `row`, rendered as one comparable string.
    ///
    /// Fails if any key column is missing, null or an empty string.
    pub fn key_of(&self, row: &Record) -> Result<String, HarvestError> {
        let parts = self
            .primary_key()
            .iter()
            .map(|column| match row.get(*column) {
                None | Some(Value::Null) => Err(HarvestError::InvalidResponse(format!(
                    "{} row without key column {column}",
                    self.name()
                ))),
                Some(Value::String(text)) if text.is_empty() => Err(HarvestError::InvalidResponse(
                    format!("{} row with empty key column {column}", self.name()),
                )),
                Some(value) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(parts).to_string())
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored player to collect match ids for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub puuid: String,
    pub platform: Platform,
    /// Tier stored at ladder collection.
    pub tier: String,
}

/// A stored match to collect details or a timeline for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRef {
    pub match_id: String,
    /// Tier of the player the match id was collected from.
    pub tier: String,
}

/// Storage for harvested rows.
pub trait Sink: Send + Sync {
    /// Insert `rows`, ignoring rows whose key already exists.
    ///
    /// Returns the number of rows actually inserted.
    fn upsert(
        &self,
        table: Table,
        rows: Vec<Record>,
    ) -> impl Future<Output = Result<usize, HarvestError>> + Send;

    /// Insert one row. A duplicate key is logged and reported as `false`.
    fn insert_one(
        &self,
        table: Table,
        row: Record,
    ) -> impl Future<Output = Result<bool, HarvestError>> + Send;

    /// Players whose platform belongs to `continent`.
    fn players_in(
        &self,
        continent: Continent,
    ) -> impl Future<Output = Result<Vec<PlayerRef>, HarvestError>> + Send;

    /// Match ids collected for `continent`.
    fn matches_in(
        &self,
        continent: Continent,
    ) -> impl Future<Output = Result<Vec<MatchRef>, HarvestError>> + Send;

    /// Matches of `continent` that already have participant rows.
    fn matches_with_participants_in(
        &self,
        continent: Continent,
    ) -> impl Future<Output = Result<Vec<MatchRef>, HarvestError>> + Send;

    /// `(team_id, team_position)` of every stored participant of `match_id`.
    fn team_positions(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<HashMap<String, (i64, String)>, HarvestError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_keys_are_columns() {
        for table in Table::ALL {
            for key in table.primary_key() {
                assert!(
                    table.columns().iter().any(|(name, _)| name == key),
                    "{table}: {key}"
                );
            }
        }
    }

    #[test]
    fn test_key_of() {
        let row = crate::transform::record(json!({"match_id": "A", "team_id": 100, "x": 1}));
        assert_eq!(Table::MatchTeams.key_of(&row).unwrap(), r#"["A",100]"#);
        assert!(Table::MatchTimeline.key_of(&row).is_err());

        let blank = crate::transform::record(json!({"puuid": "", "match_id": "A"}));
        assert!(Table::MatchParticipants.key_of(&blank).is_err());
    }
}
