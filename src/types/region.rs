//! Routing partitions of the Riot API.
//!
//! Every request goes to exactly one routing host. Platform hosts (`na1`,
//! `euw1`, ...) serve ladder and player lookups; continental hosts
//! (`americas`, `asia`, `europe`) serve match data. Each host enforces its
//! own quota, so each [`Route`] is an independent rate-limiting partition.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// A platform (local server) routing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    /// Brazil
    Br1,
    /// Europe Nordic & East
    Eun1,
    /// Europe West
    Euw1,
    /// Japan
    Jp1,
    /// Korea
    Kr,
    /// Latin America North
    La1,
    /// Latin America South
    La2,
    /// Middle East
    Me1,
    /// North America
    Na1,
    /// Oceania
    Oc1,
    /// Singapore, Malaysia & Indonesia
    Sg2,
    /// Turkey
    Tr1,
    /// Taiwan, Hong Kong & Macao
    Tw2,
    /// Vietnam
    Vn2,
}

impl Platform {
    /// Every platform, in a stable order.
    pub const ALL: [Platform; 14] = [
        Platform::Br1,
        Platform::Eun1,
        Platform::Euw1,
        Platform::Jp1,
        Platform::Kr,
        Platform::La1,
        Platform::La2,
        Platform::Me1,
        Platform::Na1,
        Platform::Oc1,
        Platform::Sg2,
        Platform::Tr1,
        Platform::Tw2,
        Platform::Vn2,
    ];

    /// The platform code as the API spells it (e.g. `"EUW1"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Br1 => "BR1",
            Platform::Eun1 => "EUN1",
            Platform::Euw1 => "EUW1",
            Platform::Jp1 => "JP1",
            Platform::Kr => "KR",
            Platform::La1 => "LA1",
            Platform::La2 => "LA2",
            Platform::Me1 => "ME1",
            Platform::Na1 => "NA1",
            Platform::Oc1 => "OC1",
            Platform::Sg2 => "SG2",
            Platform::Tr1 => "TR1",
            Platform::Tw2 => "TW2",
            Platform::Vn2 => "VN2",
        }
    }

    /// The continental routing value that serves this platform's matches.
    pub fn continent(&self) -> Continent {
        match self {
            Platform::Br1 | Platform::La1 | Platform::La2 | Platform::Na1 | Platform::Oc1 => {
                Continent::Americas
            }
            Platform::Jp1 | Platform::Kr | Platform::Sg2 | Platform::Tw2 | Platform::Vn2 => {
                Continent::Asia
            }
            Platform::Eun1 | Platform::Euw1 | Platform::Me1 | Platform::Tr1 => Continent::Europe,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarvestError::UnknownPartition(s.to_string()))
    }
}

/// A continental routing value, used for match endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Continent {
    /// North and South America, Oceania
    Americas,
    /// East and South-East Asia
    Asia,
    /// Europe, Turkey, Middle East
    Europe,
}

impl Continent {
    /// Every continent, in a stable order.
    pub const ALL: [Continent; 3] = [Continent::Americas, Continent::Asia, Continent::Europe];

    /// The continent code (e.g. `"EUROPE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::Americas => "AMERICAS",
            Continent::Asia => "ASIA",
            Continent::Europe => "EUROPE",
        }
    }

    /// Platforms whose matches are served by this continent.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        Platform::ALL
            .into_iter()
            .filter(move |p| p.continent() == *self)
    }
}

impl std::fmt::Display for Continent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Continent {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Continent::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarvestError::UnknownPartition(s.to_string()))
    }
}

/// A rate-limiting partition: one routing host of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Route {
    /// A platform host such as `euw1.api.riotgames.com`
    Platform(Platform),
    /// A continental host such as `europe.api.riotgames.com`
    Continent(Continent),
}

impl Route {
    /// Every route: all platforms followed by all continents.
    pub fn all() -> impl Iterator<Item = Route> {
        Platform::ALL
            .into_iter()
            .map(Route::Platform)
            .chain(Continent::ALL.into_iter().map(Route::Continent))
    }

    /// The routing code (e.g. `"EUW1"` or `"EUROPE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Platform(p) => p.as_str(),
            Route::Continent(c) => c.as_str(),
        }
    }

    /// The host label used in the base URL (e.g. `"euw1"`).
    pub fn host(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl From<Platform> for Route {
    fn from(platform: Platform) -> Self {
        Route::Platform(platform)
    }
}

impl From<Continent> for Route {
    fn from(continent: Continent) -> Self {
        Route::Continent(continent)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Platform>()
            .map(Route::Platform)
            .or_else(|_| s.parse::<Continent>().map(Route::Continent))
    }
}
