//! Routing and ranked types shared across the harvester.

pub mod ranked;
pub mod region;

pub use ranked::{Division, MatchType, Queue, Tier};
pub use region::{Continent, Platform, Route};
