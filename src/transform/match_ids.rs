//! Match ids to `match_ids` rows.

use serde_json::json;
use time::Date;

use super::{Record, record};
use crate::types::Continent;

/// One row per match id, tagged with the player's tier at collection time.
pub fn match_id_rows(
    match_ids: &[String],
    puuid: &str,
    game_tier: &str,
    continent: Continent,
    date: Date,
) -> Vec<Record> {
    match_ids
        .iter()
        .map(|match_id| {
            record(json!({
                "match_id": match_id,
                "puuid": puuid,
                "game_tier": game_tier,
                "continental_region": continent.as_str(),
                "date_collected": date.to_string(),
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_match_id_rows() {
        let ids = vec!["EUW1_1".to_string(), "EUW1_2".to_string()];
        let rows = match_id_rows(&ids, "p1", "EMERALD", Continent::Europe, date!(2025 - 06 - 30));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["match_id"], "EUW1_2");
        assert_eq!(rows[0]["game_tier"], "EMERALD");
        assert_eq!(rows[0]["continental_region"], "EUROPE");
        assert_eq!(rows[0]["date_collected"], "2025-06-30");
    }
}
