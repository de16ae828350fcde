//! Flattening of API payloads into table rows.
//!
//! Transforms are pure: they take the raw JSON of one response plus the
//! partition metadata the caller knows, and return [`Record`]s keyed by column
//! name. Missing optional fields default the way the API documents them
//! (zero, `false`, empty string).

pub mod match_data;
pub mod match_ids;
pub mod summoner;
pub mod timeline;

pub use match_data::{MatchRows, match_rows};
pub use match_ids::match_id_rows;
pub use summoner::{apex_summoner_rows, summoner_rows, tier_from_entries};
pub use timeline::{MINION, timeline_rows};

use serde_json::{Map, Value};
use time::{Date, OffsetDateTime};

/// One row: column name to value.
pub type Record = Map<String, Value>;

/// Build a record from a `json!` object literal.
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Today's UTC date, as stored in `date_collected` columns.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Walk `path` through nested objects.
pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

pub(crate) fn int(value: &Value, path: &[&str]) -> i64 {
    lookup(value, path).and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn float(value: &Value, path: &[&str]) -> f64 {
    lookup(value, path).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn flag(value: &Value, path: &[&str]) -> bool {
    lookup(value, path).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn text<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    lookup(value, path).and_then(Value::as_str).unwrap_or("")
}
