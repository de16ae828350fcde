//! Match timelines to `match_timeline` rows.
//!
//! Three event kinds are kept (elite monster, champion and building kills)
//! together with every participant's position at each frame.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::warn;

use super::{Record, int, lookup, record, text};

/// Stand-in killer for kills credited to minions, turrets or monsters.
pub const MINION: &str = "Minion";

/// Team id and position recorded for [`MINION`] kills.
const MINION_TEAM_ID: i64 = 999;

const ELITE_MONSTER_KILL: &str = "ELITE_MONSTER_KILL";
const CHAMPION_KILL: &str = "CHAMPION_KILL";
const BUILDING_KILL: &str = "BUILDING_KILL";

/// Identity of one actor in a timeline.
#[derive(Clone, Copy)]
struct Actor<'a> {
    puuid: &'a str,
    team_id: i64,
    team_position: &'a str,
}

#[allow(clippy::too_many_arguments)]
fn timeline_row(
    match_id: &str,
    actor: &Actor<'_>,
    timestamp: i64,
    team_id: i64,
    in_game_id: i64,
    position: Option<&Value>,
    event: &str,
    kind: &str,
) -> Record {
    record(json!({
        "match_id": match_id,
        "puuid": actor.puuid,
        "timestamp": timestamp,
        "team_id": team_id,
        "in_game_id": in_game_id,
        "team_position": actor.team_position,
        "x": position.map_or(0, |p| int(p, &["x"])),
        "y": position.map_or(0, |p| int(p, &["y"])),
        "event": event,
        "type": kind,
    }))
}

/// Rows for one timeline.
///
/// `positions` maps each player's puuid to the `(team_id, team_position)`
/// stored with their participant row. Events or frames of a player missing
/// from it are logged and skipped.
pub fn timeline_rows(
    data: &Value,
    match_id: &str,
    positions: &HashMap<String, (i64, String)>,
) -> Vec<Record> {
    let Some(info) = data.get("info") else {
        warn!(match_id, "timeline without info");
        return Vec::new();
    };

    let participants: HashMap<i64, &str> = lookup(info, &["participants"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|p| (int(p, &["participantId"]), text(p, &["puuid"])))
        .collect();

    let minion = Actor {
        puuid: MINION,
        team_id: MINION_TEAM_ID,
        team_position: "",
    };

    let actor = |in_game_id: i64| {
        if in_game_id == 0 {
            return Some(minion);
        }
        let puuid: &str = *participants.get(&in_game_id)?;
        let (team_id, team_position) = positions.get(puuid)?;
        Some(Actor {
            puuid,
            team_id: *team_id,
            team_position: team_position.as_str(),
        })
    };

    let frames = lookup(info, &["frames"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut rows = Vec::new();
    for frame in frames {
        let events = frame
            .get("events")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for event in events {
            let event_name = text(event, &["type"]);
            if ![ELITE_MONSTER_KILL, CHAMPION_KILL, BUILDING_KILL].contains(&event_name) {
                continue;
            }

            let killer_id = int(event, &["killerId"]);
            let Some(killer) = actor(killer_id) else {
                warn!(match_id, killer_id, event = event_name, "excluding event of unknown player");
                continue;
            };

            let (team_id, kind) = match event_name {
                ELITE_MONSTER_KILL => (int(event, &["killerTeamId"]), text(event, &["monsterType"])),
                CHAMPION_KILL => (killer.team_id, "KILL"),
                // teamId is the team that lost the building
                _ => (int(event, &["teamId"]), text(event, &["buildingType"])),
            };
            if kind.is_empty() {
                warn!(match_id, event = event_name, "excluding event without a type");
                continue;
            }

            rows.push(timeline_row(
                match_id,
                &killer,
                int(event, &["timestamp"]),
                team_id,
                killer_id,
                event.get("position"),
                event_name,
                kind,
            ));
        }

        let timestamp = int(frame, &["timestamp"]);
        let Some(participant_frames) = frame.get("participantFrames").and_then(Value::as_object)
        else {
            continue;
        };
        for (id, participant_frame) in participant_frames {
            let Ok(in_game_id) = id.parse::<i64>() else {
                continue;
            };
            let Some(player) = actor(in_game_id).filter(|a| a.puuid != MINION) else {
                warn!(match_id, in_game_id, "excluding frame of unknown player");
                continue;
            };
            rows.push(timeline_row(
                match_id,
                &player,
                timestamp,
                player.team_id,
                in_game_id,
                participant_frame.get("position"),
                "POSITION",
                "PARTICIPANT_FRAME",
            ));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions() -> HashMap<String, (i64, String)> {
        HashMap::from([
            ("p1".to_string(), (100, "TOP".to_string())),
            ("p2".to_string(), (200, "JUNGLE".to_string())),
        ])
    }

    fn timeline() -> Value {
        json!({
            "info": {
                "participants": [
                    {"participantId": 1, "puuid": "p1"},
                    {"participantId": 2, "puuid": "p2"},
                    {"participantId": 3, "puuid": "p3"}
                ],
                "frames": [{
                    "timestamp": 60000,
                    "participantFrames": {
                        "1": {"position": {"x": 10, "y": 20}},
                        "2": {"position": {"x": 30, "y": 40}},
                        "3": {"position": {"x": 50, "y": 60}}
                    },
                    "events": [
                        {"type": "CHAMPION_KILL", "killerId": 1, "timestamp": 61000, "position": {"x": 1, "y": 2}},
                        {"type": "CHAMPION_KILL", "killerId": 0, "timestamp": 62000, "position": {"x": 3, "y": 4}},
                        {"type": "ELITE_MONSTER_KILL", "killerId": 2, "killerTeamId": 200, "monsterType": "DRAGON", "timestamp": 63000},
                        {"type": "BUILDING_KILL", "killerId": 1, "teamId": 200, "buildingType": "TOWER_BUILDING", "timestamp": 64000},
                        {"type": "CHAMPION_KILL", "killerId": 3, "timestamp": 65000},
                        {"type": "WARD_PLACED", "creatorId": 1, "timestamp": 66000}
                    ]
                }]
            }
        })
    }

    #[test]
    fn test_event_rows() {
        let rows = timeline_rows(&timeline(), "EUW1_9", &positions());
        let events: Vec<_> = rows.iter().filter(|r| r["event"] != "POSITION").collect();
        assert_eq!(events.len(), 4);

        assert_eq!(events[0]["puuid"], "p1");
        assert_eq!(events[0]["team_id"], 100);
        assert_eq!(events[0]["type"], "KILL");
        assert_eq!(events[0]["team_position"], "TOP");
        assert_eq!(events[0]["x"], 1);

        assert_eq!(events[1]["puuid"], MINION);
        assert_eq!(events[1]["team_id"], 999);
        assert_eq!(events[1]["team_position"], "");

        assert_eq!(events[2]["type"], "DRAGON");
        assert_eq!(events[2]["team_id"], 200);

        assert_eq!(events[3]["type"], "TOWER_BUILDING");
        assert_eq!(events[3]["team_id"], 200);
        assert_eq!(events[3]["puuid"], "p1");
    }

    #[test]
    fn test_position_rows_skip_unknown_players() {
        let rows = timeline_rows(&timeline(), "EUW1_9", &positions());
        let frames: Vec<_> = rows.iter().filter(|r| r["event"] == "POSITION").collect();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|r| r["type"] == "PARTICIPANT_FRAME"));
        assert!(frames.iter().all(|r| r["timestamp"] == 60000));
        assert!(frames.iter().any(|r| r["puuid"] == "p2" && r["x"] == 30 && r["team_position"] == "JUNGLE"));
    }

    #[test]
    fn test_events_without_type_are_excluded() {
        let mut data = timeline();
        data["info"]["frames"][0]["events"] = json!([
            {"type": "ELITE_MONSTER_KILL", "killerId": 2, "killerTeamId": 200, "timestamp": 63000},
            {"type": "BUILDING_KILL", "killerId": 1, "teamId": 200, "buildingType": "", "timestamp": 64000}
        ]);
        let rows = timeline_rows(&data, "EUW1_9", &positions());
        assert!(rows.iter().all(|r| r["event"] == "POSITION"));
    }

    #[test]
    fn test_missing_info() {
        assert!(timeline_rows(&json!({}), "X", &positions()).is_empty());
    }
}
