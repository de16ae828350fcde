//! Ladder entries to `summoners` rows.

use serde_json::{Value, json};
use time::Date;
use tracing::warn;

use super::{Record, record, text};
use crate::error::HarvestError;
use crate::types::{Platform, Queue};

fn summoner_row(puuid: &str, platform: Platform, tier: &str, division: &str, date: Date) -> Record {
    record(json!({
        "puuid": puuid,
        "continental_region": platform.continent().as_str(),
        "local_region": platform.as_str(),
        "current_tier": tier,
        "current_division": division,
        "date_collected": date.to_string(),
    }))
}

fn entries_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, HarvestError> {
    value
        .as_array()
        .ok_or_else(|| HarvestError::InvalidResponse(format!("{what}: expected an array")))
}

/// Rows for one page of league entries (`[{puuid, tier, rank, ...}]`).
///
/// Entries without a `puuid` are skipped.
pub fn summoner_rows(
    page: &Value,
    platform: Platform,
    date: Date,
) -> Result<Vec<Record>, HarvestError> {
    let entries = entries_array(page, "league entries")?;
    Ok(entries
        .iter()
        .filter_map(|entry| {
            let puuid = text(entry, &["puuid"]);
            if puuid.is_empty() {
                warn!(%platform, "league entry without puuid skipped");
                return None;
            }
            Some(summoner_row(
                puuid,
                platform,
                text(entry, &["tier"]),
                text(entry, &["rank"]),
                date,
            ))
        })
        .collect())
}

/// Rows for an apex league (`{tier, entries: [{puuid, rank, ...}]}`).
pub fn apex_summoner_rows(
    league: &Value,
    platform: Platform,
    date: Date,
) -> Result<Vec<Record>, HarvestError> {
    let tier = text(league, &["tier"]);
    let entries = league
        .get("entries")
        .map(|e| entries_array(e, "apex league entries"))
        .transpose()?
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(entries
        .iter()
        .filter(|entry| !text(entry, &["puuid"]).is_empty())
        .map(|entry| summoner_row(text(entry, &["puuid"]), platform, tier, text(entry, &["rank"]), date))
        .collect())
}

/// A player's tier in `queue` from their league entries, if ranked.
pub fn tier_from_entries(entries: &Value, queue: Queue) -> Option<String> {
    entries
        .as_array()?
        .iter()
        .find(|entry| text(entry, &["queueType"]) == queue.as_str())
        .map(|entry| text(entry, &["tier"]))
        .filter(|tier| !tier.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_summoner_rows() {
        let page = json!([
            {"puuid": "p1", "tier": "GOLD", "rank": "II", "leaguePoints": 40},
            {"tier": "GOLD", "rank": "II"},
        ]);
        let rows = summoner_rows(&page, Platform::Euw1, date!(2025 - 03 - 01)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["puuid"], "p1");
        assert_eq!(rows[0]["continental_region"], "EUROPE");
        assert_eq!(rows[0]["local_region"], "EUW1");
        assert_eq!(rows[0]["current_tier"], "GOLD");
        assert_eq!(rows[0]["current_division"], "II");
        assert_eq!(rows[0]["date_collected"], "2025-03-01");
    }

    #[test]
    fn test_rejects_non_array_page() {
        assert!(summoner_rows(&json!({"status": 1}), Platform::Kr, date!(2025 - 01 - 01)).is_err());
    }

    #[test]
    fn test_apex_rows_take_tier_from_league() {
        let league = json!({
            "tier": "CHALLENGER",
            "entries": [{"puuid": "a", "rank": "I"}, {"puuid": "b", "rank": "I"}]
        });
        let rows = apex_summoner_rows(&league, Platform::Kr, date!(2025 - 01 - 01)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["current_tier"], "CHALLENGER");
        assert_eq!(rows[1]["continental_region"], "ASIA");
        assert!(apex_summoner_rows(&json!({}), Platform::Kr, date!(2025 - 01 - 01)).unwrap().is_empty());
    }

    #[test]
    fn test_tier_from_entries() {
        let entries = json!([
            {"queueType": "RANKED_FLEX_SR", "tier": "IRON"},
            {"queueType": "RANKED_SOLO_5x5", "tier": "DIAMOND"},
        ]);
        assert_eq!(tier_from_entries(&entries, Queue::RankedSolo5x5).as_deref(), Some("DIAMOND"));
        assert_eq!(tier_from_entries(&json!([]), Queue::RankedSolo5x5), None);
    }
}
