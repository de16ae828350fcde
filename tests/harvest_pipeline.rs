use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use league_harvester::HarvestError;
use league_harvester::auth::ApiKey;
use league_harvester::collect::{CollectConfig, Harvester, Stage};
use league_harvester::rate_limit::RateLimitConfig;
use league_harvester::retry::RetryPolicy;
use league_harvester::riot::{RawResponse, RiotClient, RiotClientBuilder, Transport};
use league_harvester::shutdown::{SharedShutdown, ShutdownCoordinator};
use league_harvester::sink::{MemorySink, Sink, Table};
use league_harvester::transform::Record;
use league_harvester::types::{Continent, Division, Platform, Tier};

const BASE: &str = "http://riot.test";

/// Answers requests from a script keyed by `path?query`.
///
/// A key with several responses plays them in order and then repeats the
/// last one. Unscripted requests get a 404.
#[derive(Clone, Default)]
struct ScriptedTransport {
    inner: Arc<Script>,
}

#[derive(Default)]
struct Script {
    responses: Mutex<HashMap<String, VecDeque<RawResponse>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn respond(self, key: &str, body: Value) -> Self {
        self.respond_with(key, RawResponse::ok(body.to_string()))
    }

    fn respond_with(self, key: &str, response: RawResponse) -> Self {
        self.inner
            .responses
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.inner.requests.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }
}

impl Transport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        query: &[(String, String)],
    ) -> Result<RawResponse, HarvestError> {
        assert!(headers.iter().any(|(name, _)| *name == "X-Riot-Token"));

        let path = url.strip_prefix(BASE).unwrap_or(url);
        let key = if query.is_empty() {
            path.to_string()
        } else {
            let query: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{path}?{}", query.join("&"))
        };
        self.inner.requests.lock().unwrap().push(key.clone());

        let mut responses = self.inner.responses.lock().unwrap();
        let response = match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| RawResponse::new(404, "{}")))
    }
}

fn row(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn entries(puuids: &[&str]) -> Value {
    puuids
        .iter()
        .map(|p| json!({"puuid": p, "queueType": "RANKED_SOLO_5x5", "tier": "GOLD", "rank": "I"}))
        .collect()
}

fn client(transport: &ScriptedTransport, shutdown: SharedShutdown) -> RiotClient<ScriptedTransport> {
    let rate_limit = RateLimitConfig::default()
        .with_max_calls(10_000, Duration::from_secs(1))
        .with_max_calls_per_second(10_000)
        .with_start_full(true);
    client_with_limits(transport, shutdown, rate_limit)
}

fn client_with_limits(
    transport: &ScriptedTransport,
    shutdown: SharedShutdown,
    rate_limit: RateLimitConfig,
) -> RiotClient<ScriptedTransport> {
    RiotClientBuilder::with_transport(transport.clone())
        .api_key(ApiKey::new("RGAPI-test").unwrap())
        .base_url(BASE)
        .rate_limit(rate_limit)
        .retry_policy(RetryPolicy::default().with_max_retries(2).with_backoff(1.0, Duration::from_millis(1)))
        .shutdown(shutdown)
        .build()
        .unwrap()
}

fn harvester(
    transport: &ScriptedTransport,
    sink: &Arc<MemorySink>,
    config: CollectConfig,
) -> Harvester<MemorySink, ScriptedTransport> {
    Harvester::new(client(transport, ShutdownCoordinator::shared()), Arc::clone(sink), config).unwrap()
}

fn ladder_config() -> CollectConfig {
    CollectConfig::default()
        .with_platforms([Platform::Euw1])
        .with_continents([Continent::Europe])
        .with_tiers([Tier::Gold])
        .with_divisions([Division::I])
}

const GOLD_I: &str = "/lol/league-exp/v4/entries/RANKED_SOLO_5x5/GOLD/I";

#[tokio::test]
async fn test_pagination_stops_at_empty_page() {
    let transport = ScriptedTransport::default()
        .respond(&format!("{GOLD_I}?page=1"), entries(&["a", "b"]))
        .respond(&format!("{GOLD_I}?page=2"), entries(&["c"]))
        .respond(&format!("{GOLD_I}?page=3"), json!([]));
    let sink = Arc::new(MemorySink::new());
    let config = ladder_config().with_pages(1, None);

    let report = harvester(&transport, &sink, config).run(&[Stage::Summoners]).await.unwrap();

    assert_eq!(transport.count(&format!("{GOLD_I}?")), 3);
    assert_eq!(sink.len(Table::Summoners), 3);
    let stage = report.stage(Stage::Summoners).unwrap();
    assert_eq!(stage.fetched(), 3);
    assert_eq!(stage.stored(), 3);

    let summoner = &sink.rows(Table::Summoners)[0];
    assert_eq!(summoner["local_region"], "EUW1");
    assert_eq!(summoner["continental_region"], "EUROPE");
}

#[tokio::test]
async fn test_page_limit_and_start_page() {
    let transport = ScriptedTransport::default()
        .respond(&format!("{GOLD_I}?page=2"), entries(&["a"]))
        .respond(&format!("{GOLD_I}?page=3"), entries(&["b"]))
        .respond(&format!("{GOLD_I}?page=4"), entries(&["c"]));
    let sink = Arc::new(MemorySink::new());
    let config = ladder_config().with_pages(2, Some(2));

    harvester(&transport, &sink, config).run(&[Stage::Summoners]).await.unwrap();

    assert_eq!(
        transport.requests(),
        [format!("{GOLD_I}?page=2"), format!("{GOLD_I}?page=3")]
    );
    assert_eq!(sink.len(Table::Summoners), 2);
}

#[tokio::test]
async fn test_apex_tier_fetched_once() {
    let apex = "/lol/league/v4/challengerleagues/by-queue/RANKED_SOLO_5x5";
    let transport = ScriptedTransport::default()
        .respond(apex, json!({"tier": "CHALLENGER", "entries": [{"puuid": "top", "rank": "I"}]}))
        .respond(&format!("{GOLD_I}?page=1"), json!([]))
        .respond("/lol/league-exp/v4/entries/RANKED_SOLO_5x5/GOLD/II?page=1", json!([]));
    let sink = Arc::new(MemorySink::new());
    let config = ladder_config()
        .with_tiers([Tier::Challenger, Tier::Gold])
        .with_divisions([Division::I, Division::II]);

    harvester(&transport, &sink, config).run(&[Stage::Summoners]).await.unwrap();

    assert_eq!(transport.count(apex), 1);
    assert_eq!(transport.requests().len(), 3);
    let rows = sink.rows(Table::Summoners);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["current_tier"], "CHALLENGER");
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let transport = ScriptedTransport::default()
        .respond_with(&format!("{GOLD_I}?page=1"), RawResponse::new(403, "{}"))
        .respond("/lol/league-exp/v4/entries/RANKED_SOLO_5x5/GOLD/II?page=1", entries(&["x"]))
        .respond("/lol/league-exp/v4/entries/RANKED_SOLO_5x5/GOLD/II?page=2", json!([]));
    let sink = Arc::new(MemorySink::new());
    let config = ladder_config().with_divisions([Division::I, Division::II]);

    let report = harvester(&transport, &sink, config).run(&[Stage::Summoners]).await.unwrap();

    let stage = report.stage(Stage::Summoners).unwrap();
    assert_eq!(stage.failed(), 1);
    assert_eq!(stage.stored(), 1);
    assert_eq!(transport.count(&format!("{GOLD_I}?")), 1);
}

#[tokio::test]
async fn test_match_ids_use_refreshed_tier() {
    let transport = ScriptedTransport::default()
        .respond(
            "/lol/match/v5/matches/by-puuid/p1/ids?type=ranked&start=0&count=100",
            json!(["EUW1_1", "EUW1_2"]),
        )
        .respond(
            "/lol/league/v4/entries/by-puuid/p1",
            json!([
                {"queueType": "RANKED_FLEX_SR", "tier": "IRON"},
                {"queueType": "RANKED_SOLO_5x5", "tier": "PLATINUM"}
            ]),
        )
        .respond("/lol/match/v5/matches/by-puuid/p2/ids?type=ranked&start=0&count=100", json!(["EUW1_3"]));
    let sink = Arc::new(MemorySink::new());
    sink.upsert(
        Table::Summoners,
        vec![
            row(json!({"puuid": "p1", "local_region": "EUW1", "current_tier": "GOLD"})),
            // tier lookup 404s: stored tier is kept
            row(json!({"puuid": "p2", "local_region": "EUN1", "current_tier": "SILVER"})),
            // other continent
            row(json!({"puuid": "p3", "local_region": "KR", "current_tier": "GOLD"})),
        ],
    )
    .await
    .unwrap();
    let config = ladder_config()
        .with_platforms([Platform::Euw1, Platform::Eun1, Platform::Kr])
        .with_lookback_days(None);

    let report = harvester(&transport, &sink, config).run(&[Stage::MatchIds]).await.unwrap();

    let rows = sink.rows(Table::MatchIds);
    let tiers: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r["match_id"].as_str().unwrap(), r["game_tier"].as_str().unwrap()))
        .collect();
    assert_eq!(tiers, [("EUW1_1", "PLATINUM"), ("EUW1_2", "PLATINUM"), ("EUW1_3", "SILVER")]);
    assert!(rows.iter().all(|r| r["continental_region"] == "EUROPE"));
    assert_eq!(transport.count("/lol/match/v5/matches/by-puuid/p3"), 0);
    assert_eq!(report.stage(Stage::MatchIds).unwrap().failed(), 0);
}

fn match_payload(match_id: &str) -> Value {
    let team = |id: i64, win: bool| json!({"teamId": id, "win": win, "objectives": {"dragon": {"kills": 2}}});
    let participant = |puuid: &str, team: i64, position: &str| {
        json!({"puuid": puuid, "teamId": team, "teamPosition": position, "goldEarned": 9000})
    };
    json!({
        "metadata": {"matchId": match_id},
        "info": {
            "gameDuration": 1800,
            "gameEndTimestamp": 1_700_000_000_000_i64,
            "endOfGameResult": "GameComplete",
            "teams": [team(100, true), team(200, false)],
            "participants": [participant("p1", 100, "TOP"), participant("p2", 200, "JUNGLE")]
        }
    })
}

async fn seed_match_ids(sink: &MemorySink, ids: &[&str]) {
    let rows = ids
        .iter()
        .map(|id| row(json!({"match_id": id, "puuid": "p1", "game_tier": "GOLD", "continental_region": "EUROPE"})))
        .collect();
    sink.upsert(Table::MatchIds, rows).await.unwrap();
}

#[tokio::test]
async fn test_match_data_skips_failures_and_remakes() {
    let remake = json!({"metadata": {"matchId": "EUW1_3"}, "info": {"teams": []}});
    let transport = ScriptedTransport::default()
        .respond("/lol/match/v5/matches/EUW1_2", match_payload("EUW1_2"))
        .respond("/lol/match/v5/matches/EUW1_3", remake);
    let sink = Arc::new(MemorySink::new());
    seed_match_ids(&sink, &["EUW1_1", "EUW1_2", "EUW1_3"]).await;

    let report = harvester(&transport, &sink, ladder_config().with_batch_size(1))
        .run(&[Stage::MatchData])
        .await
        .unwrap();

    let stage = report.stage(Stage::MatchData).unwrap();
    let europe = stage.partition("EUROPE").unwrap();
    assert_eq!(europe.failed, 1);
    assert_eq!(europe.fetched, 2);
    assert_eq!(europe.stored, 4);
    assert_eq!(sink.len(Table::MatchTeams), 2);
    assert_eq!(sink.len(Table::MatchParticipants), 2);
    assert_eq!(sink.rows(Table::MatchParticipants)[0]["gold_per_minute"], 300.0);

    // a second run only fetches matches still missing participants
    let again = ScriptedTransport::default();
    harvester(&again, &sink, ladder_config()).run(&[Stage::MatchData]).await.unwrap();
    assert!(!again.requests().contains(&"/lol/match/v5/matches/EUW1_2".to_string()));
}

#[tokio::test]
async fn test_full_run_in_pipeline_order() {
    let timeline = json!({
        "info": {
            "participants": [{"participantId": 1, "puuid": "p1"}, {"participantId": 2, "puuid": "p2"}],
            "frames": [{
                "timestamp": 60000,
                "participantFrames": {"1": {"position": {"x": 1, "y": 1}}, "2": {"position": {"x": 2, "y": 2}}},
                "events": [{"type": "CHAMPION_KILL", "killerId": 2, "timestamp": 61000, "position": {"x": 5, "y": 5}}]
            }]
        }
    });
    let transport = ScriptedTransport::default()
        .respond(&format!("{GOLD_I}?page=1"), entries(&["p1"]))
        .respond(&format!("{GOLD_I}?page=2"), json!([]))
        .respond("/lol/match/v5/matches/by-puuid/p1/ids?type=ranked&start=0&count=100", json!(["EUW1_9"]))
        .respond("/lol/match/v5/matches/EUW1_9", match_payload("EUW1_9"))
        .respond("/lol/match/v5/matches/EUW1_9/timeline", timeline);
    let sink = Arc::new(MemorySink::new());
    let config = ladder_config()
        .with_pages(1, None)
        .with_lookback_days(None)
        .with_refresh_tiers(false);

    let report = harvester(&transport, &sink, config)
        .run(&[Stage::Timeline, Stage::MatchData, Stage::Summoners, Stage::MatchIds])
        .await
        .unwrap();

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ALL);
    assert_eq!(sink.len(Table::Summoners), 1);
    assert_eq!(sink.len(Table::MatchIds), 1);
    assert_eq!(sink.len(Table::MatchParticipants), 2);

    let timeline_rows = sink.rows(Table::MatchTimeline);
    // one kill plus two positions
    assert_eq!(timeline_rows.len(), 3);
    let kill = &timeline_rows[0];
    assert_eq!(kill["event"], "CHAMPION_KILL");
    assert_eq!(kill["puuid"], "p2");
    assert_eq!(kill["team_id"], 200);
    assert_eq!(kill["team_position"], "JUNGLE");
}

#[tokio::test]
async fn test_shutdown_cancels_run() {
    let transport = ScriptedTransport::default();
    let sink = Arc::new(MemorySink::new());
    let shutdown = ShutdownCoordinator::shared();
    let harvester = Harvester::new(client(&transport, shutdown.clone()), sink, ladder_config()).unwrap();

    shutdown.request_shutdown();
    let result = harvester.run(&Stage::ALL).await;

    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let transport = ScriptedTransport::default();
    let result = Harvester::new(
        client(&transport, ShutdownCoordinator::shared()),
        Arc::new(MemorySink::new()),
        ladder_config().with_max_concurrency(0),
    );
    assert!(matches!(result, Err(HarvestError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_running_partitions() {
    let transport = ScriptedTransport::default();
    let sink = Arc::new(MemorySink::new());
    let rows = [("EUW1_1", "EUROPE"), ("EUW1_2", "EUROPE"), ("KR_1", "ASIA"), ("KR_2", "ASIA")]
        .iter()
        .map(|(id, continent)| {
            row(json!({"match_id": id, "puuid": "p1", "game_tier": "GOLD", "continental_region": continent}))
        })
        .collect();
    sink.upsert(Table::MatchIds, rows).await.unwrap();

    // one call per route, then a ten minute wait for the next token
    let window = Duration::from_secs(600);
    let rate_limit = RateLimitConfig::default()
        .with_max_calls(1, window)
        .with_max_calls_per_second(10)
        .with_start_full(true);
    let shutdown = ShutdownCoordinator::shared();
    let config = ladder_config().with_continents([Continent::Europe, Continent::Asia]);
    let harvester = Harvester::new(
        client_with_limits(&transport, shutdown.clone(), rate_limit),
        Arc::clone(&sink),
        config,
    )
    .unwrap();

    let start = Instant::now();
    let run = tokio::spawn(async move { harvester.run(&[Stage::MatchData]).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.requests().len(), 2);
    shutdown.request_shutdown();

    let result = run.await.unwrap();
    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert!(start.elapsed() < window, "{:?}", start.elapsed());

    tokio::time::sleep(window * 2).await;
    assert_eq!(transport.requests().len(), 2);
}
