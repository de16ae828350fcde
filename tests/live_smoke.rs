use league_harvester::auth::ApiKey;
use league_harvester::riot::RiotClient;
use league_harvester::types::{Continent, Division, Platform, Queue, Tier};

fn live_tests_enabled() -> bool {
    std::env::var("RIOT_LIVE_TESTS").ok().as_deref() == Some("1")
}

#[tokio::test]
#[ignore]
async fn live_ladder_and_match_smoke() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    if !live_tests_enabled() {
        return Ok(());
    }

    let api_key = match ApiKey::from_env() {
        Ok(key) => key,
        Err(_) => return Ok(()),
    };
    let client = RiotClient::builder().api_key(api_key).build()?;

    let page = client
        .league_entries(Platform::Euw1, Queue::RankedSolo5x5, Tier::Gold, Division::I, 1)
        .await?;
    let Some(puuid) = page[0]["puuid"].as_str() else {
        return Ok(());
    };

    let ids = client
        .match_ids_by_puuid(Continent::Europe, puuid, &Default::default())
        .await?;
    if let Some(match_id) = ids.first() {
        let data = client.match_by_id(Continent::Europe, match_id).await?;
        assert_eq!(data["metadata"]["matchId"], match_id.as_str());
    }

    Ok(())
}
