//! Riot API endpoint paths.

use crate::types::Route;

/// Domain shared by every routing host.
pub const RIOT_API_DOMAIN: &str = "api.riotgames.com";

/// Production base URL for a routing host, e.g. `https://euw1.api.riotgames.com`.
pub fn production_base_url(route: Route) -> String {
    format!("https://{}.{}", route.host(), RIOT_API_DOMAIN)
}

/// League endpoints, served by platform hosts.
pub mod league {
    /// Paged league entries: `/{queue}/{tier}/{division}?page=`.
    pub const ENTRIES_EXP: &str = "/lol/league-exp/v4/entries";
    /// Apex leagues: `/{segment}/by-queue/{queue}`.
    pub const LEAGUES: &str = "/lol/league/v4";
    /// League entries of one player: `/{puuid}`.
    pub const ENTRIES_BY_PUUID: &str = "/lol/league/v4/entries/by-puuid";
}

/// Match endpoints, served by continental hosts.
pub mod matches {
    /// Match ids of one player: `/{puuid}/ids`.
    pub const BY_PUUID: &str = "/lol/match/v5/matches/by-puuid";
    /// Match details: `/{matchId}`, timeline: `/{matchId}/timeline`.
    pub const MATCHES: &str = "/lol/match/v5/matches";
}
