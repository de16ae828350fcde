//! Match details to `match_teams` and `match_participants` rows.

use serde_json::{Value, json};
use tracing::warn;

use super::{Record, flag, float, int, lookup, record, text};
use crate::error::HarvestError;

/// Dragons needed for the soul.
const DRAGON_SOUL_KILLS: i64 = 4;

/// Rows produced from one match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchRows {
    pub teams: Vec<Record>,
    pub participants: Vec<Record>,
}

/// Game length in minutes.
///
/// `gameDuration` is in seconds when `gameEndTimestamp` is present and in
/// milliseconds on older payloads without it.
fn game_minutes(info: &Value) -> f64 {
    let duration = float(info, &["gameDuration"]);
    if int(info, &["gameEndTimestamp"]) != 0 {
        duration / 60.0
    } else {
        duration / 1000.0 / 60.0
    }
}

fn team_row(team: &Value, match_id: &str, game_tier: &str, end_of_game_result: &str) -> Record {
    let objective = |name: &str| int(team, &["objectives", name, "kills"]);
    let dragon_kills = objective("dragon");

    record(json!({
        "match_id": match_id,
        "team_id": int(team, &["teamId"]),
        "killed_atakhan": objective("atakhan"),
        "baron_kills": objective("baron"),
        "champion_kills": objective("champion"),
        "dragon_kills": dragon_kills,
        "dragon_soul": dragon_kills >= DRAGON_SOUL_KILLS,
        "horde_kills": objective("horde"),
        "rift_herald_kills": objective("riftHerald"),
        "tower_kills": objective("tower"),
        "team_win": flag(team, &["win"]),
        "end_of_game_result": end_of_game_result,
        "game_tier": game_tier,
    }))
}

fn participant_row(
    p: &Value,
    match_id: &str,
    game_tier: &str,
    end_of_game_result: &str,
    minutes: f64,
) -> Record {
    let gold_earned = int(p, &["goldEarned"]);
    let gold_per_minute = if minutes > 0.0 {
        gold_earned as f64 / minutes
    } else {
        0.0
    };

    record(json!({
        "puuid": text(p, &["puuid"]),
        "match_id": match_id,
        "team_id": int(p, &["teamId"]),
        "game_tier": game_tier,

        "champion_kills": int(p, &["challenges", "takedowns"]),
        "assists": int(p, &["assists"]),
        "deaths": int(p, &["deaths"]),
        "kda": float(p, &["challenges", "kda"]),

        "gold_earned": gold_earned,
        "gold_per_minute": gold_per_minute,
        "total_minions_killed": int(p, &["totalMinionsKilled"]),
        "max_level_lead_lane_opponent": int(p, &["challenges", "maxLevelLeadLaneOpponent"]),
        "lane_minions_first_10_minutes": int(p, &["challenges", "laneMinionsFirst10Minutes"]),

        "damage_per_minute": float(p, &["challenges", "damagePerMinute"]),
        "kill_participation": float(p, &["challenges", "killParticipation"]),

        "control_wards_placed": int(p, &["controlWardsPlaced"]),
        "wards_placed": int(p, &["wardsPlaced"]),
        "wards_killed": int(p, &["wardsKilled"]),
        "vision_score": int(p, &["visionScore"]),
        "vision_wards_bought": int(p, &["visionWardsBoughtInGame"]),

        "assist_me_pings": int(p, &["assistMePings"]),
        "all_in_pings": int(p, &["allInPings"]),
        "enemy_missing_pings": int(p, &["enemyMissingPings"]),
        "need_vision_pings": int(p, &["needVisionPings"]),
        "on_my_way_pings": int(p, &["onMyWayPings"]),
        "get_back_pings": int(p, &["getBackPings"]),
        "push_pings": int(p, &["pushPings"]),
        "hold_pings": int(p, &["holdPings"]),

        "champion_name": text(p, &["championName"]),
        "individual_position": text(p, &["individualPosition"]),
        "team_position": text(p, &["teamPosition"]),

        "had_open_nexus": flag(p, &["hadOpenNexus"]),
        "win": flag(p, &["win"]),
        "end_of_game_result": end_of_game_result,
    }))
}

/// Team and participant rows of one match.
///
/// Returns `Ok(None)` for matches without exactly two teams (remakes,
/// arena and other non-standard modes).
pub fn match_rows(data: &Value, game_tier: &str) -> Result<Option<MatchRows>, HarvestError> {
    let match_id = text(data, &["metadata", "matchId"]);
    if match_id.is_empty() {
        return Err(HarvestError::InvalidResponse(
            "match payload without metadata.matchId".into(),
        ));
    }
    let info = data
        .get("info")
        .ok_or_else(|| HarvestError::InvalidResponse(format!("match {match_id} without info")))?;
    let end_of_game_result = text(info, &["endOfGameResult"]);

    let teams = lookup(info, &["teams"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if teams.len() != 2 {
        return Ok(None);
    }

    let minutes = game_minutes(info);
    let participants = lookup(info, &["participants"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(Some(MatchRows {
        teams: teams
            .iter()
            .map(|team| team_row(team, match_id, game_tier, end_of_game_result))
            .collect(),
        participants: participants
            .iter()
            .filter(|p| {
                let known = !text(p, &["puuid"]).is_empty();
                if !known {
                    warn!(match_id, "excluding participant without puuid");
                }
                known
            })
            .map(|p| participant_row(p, match_id, game_tier, end_of_game_result, minutes))
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(teams: usize) -> Value {
        let team = |id: i64, win: bool, dragons: i64| {
            json!({
                "teamId": id,
                "win": win,
                "objectives": {
                    "dragon": {"kills": dragons},
                    "baron": {"kills": 1},
                    "tower": {"kills": 7},
                    "atakhan": {"kills": 0}
                }
            })
        };
        json!({
            "metadata": {"matchId": "NA1_42"},
            "info": {
                "gameDuration": 1800,
                "gameEndTimestamp": 1_700_000_000_000_i64,
                "endOfGameResult": "GameComplete",
                "teams": (0..teams).map(|i| team(100 * (i as i64 + 1), i == 0, 4 - i as i64)).collect::<Vec<_>>(),
                "participants": [{
                    "puuid": "p1",
                    "teamId": 100,
                    "goldEarned": 15000,
                    "assists": 9,
                    "championName": "Ahri",
                    "teamPosition": "MIDDLE",
                    "win": true,
                    "challenges": {"takedowns": 14, "kda": 4.5}
                }]
            }
        })
    }

    #[test]
    fn test_team_rows() {
        let rows = match_rows(&sample_match(2), "PLATINUM").unwrap().unwrap();
        assert_eq!(rows.teams.len(), 2);
        let blue = &rows.teams[0];
        assert_eq!(blue["team_id"], 100);
        assert_eq!(blue["dragon_kills"], 4);
        assert_eq!(blue["dragon_soul"], true);
        assert_eq!(blue["team_win"], true);
        assert_eq!(blue["horde_kills"], 0);
        assert_eq!(blue["game_tier"], "PLATINUM");
        assert_eq!(rows.teams[1]["dragon_soul"], false);
    }

    #[test]
    fn test_participant_rows() {
        let rows = match_rows(&sample_match(2), "PLATINUM").unwrap().unwrap();
        let p = &rows.participants[0];
        assert_eq!(p["champion_kills"], 14);
        assert_eq!(p["gold_per_minute"], 500.0);
        assert_eq!(p["champion_name"], "Ahri");
        assert_eq!(p["end_of_game_result"], "GameComplete");
        assert_eq!(p["hold_pings"], 0);
    }

    #[test]
    fn test_duration_in_milliseconds_without_end_timestamp() {
        let mut data = sample_match(2);
        data["info"]["gameEndTimestamp"] = Value::Null;
        data["info"]["gameDuration"] = json!(1_800_000);
        let rows = match_rows(&data, "GOLD").unwrap().unwrap();
        assert_eq!(rows.participants[0]["gold_per_minute"], 500.0);
    }

    #[test]
    fn test_skips_matches_without_two_teams() {
        assert_eq!(match_rows(&sample_match(1), "GOLD").unwrap(), None);
        assert_eq!(match_rows(&sample_match(4), "GOLD").unwrap(), None);
    }

    #[test]
    fn test_participants_without_puuid_are_excluded() {
        let mut data = sample_match(2);
        let participants = data["info"]["participants"].as_array_mut().unwrap();
        participants.push(json!({"teamId": 200, "goldEarned": 100}));
        participants.push(json!({"puuid": "", "teamId": 200, "goldEarned": 200}));

        let rows = match_rows(&data, "GOLD").unwrap().unwrap();
        assert_eq!(rows.participants.len(), 1);
        assert_eq!(rows.participants[0]["puuid"], "p1");
    }

    #[test]
    fn test_missing_match_id() {
        assert!(match_rows(&json!({"info": {}}), "GOLD").is_err());
    }
}
