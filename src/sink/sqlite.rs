//! SQLite sink.
//!
//! The connection lives behind a mutex and every statement runs on tokio's
//! blocking pool, so partition tasks never block the runtime on disk I/O.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use serde_json::Value;
use tracing::{debug, warn};

use super::{MatchRef, PlayerRef, Sink, Table};
use crate::error::HarvestError;
use crate::transform::Record;
use crate::types::{Continent, Platform};

/// A [`Sink`] backed by a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn create_table_sql(table: Table) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|(name, kind)| format!("{} {kind}", quote(name)))
        .collect::<Vec<_>>()
        .join(", ");
    let key = table
        .primary_key()
        .iter()
        .map(|name| quote(name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns}, PRIMARY KEY ({key}))",
        quote(table.name())
    )
}

fn insert_sql(table: Table, or_ignore: bool) -> String {
    let columns = table.columns();
    let names = columns
        .iter()
        .map(|(name, _)| quote(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
    format!(
        "{verb} INTO {} ({names}) VALUES ({placeholders})",
        quote(table.name())
    )
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn row_values(table: Table, row: &Record) -> Vec<SqlValue> {
    table
        .columns()
        .iter()
        .map(|(name, _)| to_sql(row.get(*name)))
        .collect()
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl SqliteSink {
    /// Open (or create) the database at `path` and create missing tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A private in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HarvestError> {
        for table in Table::ALL {
            conn.execute(&create_table_sql(table), [])?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, HarvestError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, HarvestError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        })
        .await
        .map_err(|e| HarvestError::Task(e.to_string()))?
    }

    /// Number of rows in `table`.
    pub async fn count(&self, table: Table) -> Result<usize, HarvestError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", quote(table.name()));
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn match_refs(
        &self,
        continent: Continent,
        with_participants: bool,
    ) -> Result<Vec<MatchRef>, HarvestError> {
        self.with_conn(move |conn| {
            let sql = if with_participants {
                "SELECT m.match_id, m.game_tier FROM match_ids m \
                 WHERE m.continental_region = ?1 \
                 AND EXISTS (SELECT 1 FROM match_participants p WHERE p.match_id = m.match_id) \
                 ORDER BY m.rowid"
            } else {
                "SELECT match_id, game_tier FROM match_ids \
                 WHERE continental_region = ?1 ORDER BY rowid"
            };
            let mut stmt = conn.prepare(sql)?;
            let refs = stmt
                .query_map(params![continent.as_str()], |row| {
                    Ok(MatchRef {
                        match_id: row.get(0)?,
                        tier: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(refs)
        })
        .await
    }
}

impl Sink for SqliteSink {
    async fn upsert(&self, table: Table, rows: Vec<Record>) -> Result<usize, HarvestError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in &rows {
            table.key_of(row)?;
        }

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare_cached(&insert_sql(table, true))?;
                for row in &rows {
                    inserted += stmt.execute(params_from_iter(row_values(table, row)))?;
                }
            }
            tx.commit()?;
            debug!(%table, rows = rows.len(), inserted, "batch committed");
            Ok(inserted)
        })
        .await
    }

    async fn insert_one(&self, table: Table, row: Record) -> Result<bool, HarvestError> {
        let key = table.key_of(&row)?;
        self.with_conn(move |conn| {
            let sql = insert_sql(table, false);
            match conn.execute(&sql, params_from_iter(row_values(table, &row))) {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => {
                    warn!(%table, key, "row already exists");
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn players_in(&self, continent: Continent) -> Result<Vec<PlayerRef>, HarvestError> {
        let platforms: Vec<String> = continent.platforms().map(|p| p.as_str().to_string()).collect();
        self.with_conn(move |conn| {
            let placeholders = (1..=platforms.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT puuid, local_region, current_tier FROM summoners \
                 WHERE local_region IN ({placeholders}) ORDER BY rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(platforms.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(puuid, region, tier)| {
                    let platform: Platform = region.parse().ok()?;
                    Some(PlayerRef {
                        puuid,
                        platform,
                        tier: tier.unwrap_or_default(),
                    })
                })
                .collect())
        })
        .await
    }

    async fn matches_in(&self, continent: Continent) -> Result<Vec<MatchRef>, HarvestError> {
        self.match_refs(continent, false).await
    }

    async fn matches_with_participants_in(
        &self,
        continent: Continent,
    ) -> Result<Vec<MatchRef>, HarvestError> {
        self.match_refs(continent, true).await
    }

    async fn team_positions(
        &self,
        match_id: &str,
    ) -> Result<HashMap<String, (i64, String)>, HarvestError> {
        let match_id = match_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT puuid, team_id, team_position FROM match_participants WHERE match_id = ?1",
            )?;
            let positions = stmt
                .query_map(params![match_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        (
                            row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                            row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        ),
                    ))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok(positions)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_quotes_identifiers() {
        let sql = create_table_sql(Table::MatchTimeline);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"match_timeline\""));
        assert!(sql.contains("\"type\" TEXT"));
        assert!(sql.contains(
            "PRIMARY KEY (\"match_id\", \"puuid\", \"timestamp\", \"event\", \"type\")"
        ));
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql(Table::MatchIds, true),
            "INSERT OR IGNORE INTO \"match_ids\" (\"match_id\", \"puuid\", \"game_tier\", \
             \"continental_region\", \"date_collected\") VALUES (?1, ?2, ?3, ?4, ?5)"
        );
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(to_sql(Some(&Value::Bool(true))), SqlValue::Integer(1));
        assert_eq!(to_sql(Some(&serde_json::json!(2.5))), SqlValue::Real(2.5));
        assert_eq!(to_sql(None), SqlValue::Null);
    }
}
