//! SQLite-backed popularity store
//!
//! - WAL mode on disk; one connection behind a mutex, so calls run one at a
//!   time
//! - Per-instrument aggregation done in SQL (window functions), so callers
//!   never pull unbounded raw samples
//! - Every read runs on the blocking pool; a caller-side timeout can fire
//!   while SQLite is still working

use super::{InstrumentDirectory, SampleStore, WindowBounds};
use crate::{
    analytics::query::{SampleQuery, SortDirection, TimeRange},
    models::{InstrumentRecord, Sample},
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, types::Value, Connection, OpenFlags};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;  -- 64MB cache
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS popularity_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instrument_id TEXT NOT NULL,
    popularity INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_popularity_samples_instrument_ts
    ON popularity_samples(instrument_id, timestamp DESC, id DESC);

CREATE INDEX IF NOT EXISTS idx_popularity_samples_ts
    ON popularity_samples(timestamp DESC);

CREATE TABLE IF NOT EXISTS instruments (
    instrument_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL UNIQUE
) WITHOUT ROWID;
"#;

/// Same-timestamp ties go to the highest row id, i.e. the latest insert.
const LATEST_PER_INSTRUMENT_SQL: &str = r#"
SELECT instrument_id, popularity, timestamp FROM (
    SELECT instrument_id, popularity, timestamp,
           ROW_NUMBER() OVER (
               PARTITION BY instrument_id ORDER BY timestamp DESC, id DESC
           ) AS rn
    FROM popularity_samples
    WHERE timestamp >= ?1 AND timestamp <= ?2
)
WHERE rn = 1
ORDER BY instrument_id
"#;

const WINDOW_BOUNDS_SQL: &str = r#"
WITH ranked AS (
    SELECT instrument_id, popularity, timestamp,
           ROW_NUMBER() OVER (
               PARTITION BY instrument_id ORDER BY timestamp ASC, id ASC
           ) AS first_rn,
           ROW_NUMBER() OVER (
               PARTITION BY instrument_id ORDER BY timestamp DESC, id DESC
           ) AS last_rn
    FROM popularity_samples
    WHERE timestamp >= ?1 AND timestamp <= ?2
)
SELECT s.instrument_id, s.popularity, e.popularity
FROM ranked s
JOIN ranked e ON e.instrument_id = s.instrument_id AND e.last_rn = 1
WHERE s.first_rn = 1
ORDER BY s.instrument_id
"#;

const COUNT_DISTINCT_SQL: &str = "SELECT COUNT(DISTINCT instrument_id) FROM popularity_samples \
     WHERE timestamp >= ?1 AND timestamp <= ?2";

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const SYMBOL_LOOKUP_CHUNK: usize = 500;

pub struct PopularityDb {
    conn: Arc<Mutex<Connection>>,
}

impl PopularityDb {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();

        if db_path != ":memory:" && journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM popularity_samples", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        info!(path = db_path, samples = count, "📊 Popularity database ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .context("sqlite worker task failed")?
    }

    pub fn insert_sample(&self, sample: &Sample) -> Result<()> {
        self.insert_samples(std::slice::from_ref(sample)).map(|_| ())
    }

    /// Append samples in one transaction.
    pub fn insert_samples(&self, samples: &[Sample]) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO popularity_samples (instrument_id, popularity, timestamp) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for sample in samples {
                stmt.execute(params![
                    &sample.instrument_id,
                    sample.popularity,
                    sample.timestamp
                ])?;
            }
        }
        tx.commit()?;

        debug!("📦 Inserted {} popularity samples", samples.len());
        Ok(samples.len())
    }

    /// Map `instrument_id` to `symbol`. Any other instrument currently holding
    /// `symbol` loses it, so the mapping stays one-to-one.
    pub fn upsert_instrument(&self, record: &InstrumentRecord) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let evicted = tx.execute(
            "DELETE FROM instruments WHERE symbol = ?1 AND instrument_id != ?2",
            params![&record.symbol, &record.instrument_id],
        )?;
        if evicted > 0 {
            warn!(
                symbol = %record.symbol,
                instrument_id = %record.instrument_id,
                "symbol reassigned to a new instrument"
            );
        }
        tx.execute(
            "INSERT INTO instruments (instrument_id, symbol) VALUES (?1, ?2) \
             ON CONFLICT(instrument_id) DO UPDATE SET symbol = excluded.symbol",
            params![&record.instrument_id, &record.symbol],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM popularity_samples", [], |row| {
            row.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }
}

/// Open ends become the full `i64` range so the timestamp index can serve
/// every windowed read.
fn range_bounds(range: &TimeRange) -> (i64, i64) {
    (range.since.unwrap_or(i64::MIN), range.until.unwrap_or(i64::MAX))
}

fn build_sample_query(query: &SampleQuery) -> (String, Vec<Value>) {
    let mut sql = String::from(
        "SELECT instrument_id, popularity, timestamp FROM popularity_samples WHERE 1 = 1",
    );
    let mut values: Vec<Value> = Vec::with_capacity(5);

    if let Some(id) = &query.filter.instrument_id {
        sql.push_str(" AND instrument_id = ?");
        values.push(Value::Text(id.clone()));
    }
    if let Some(since) = query.filter.range.since {
        sql.push_str(" AND timestamp >= ?");
        values.push(Value::Integer(since));
    }
    if let Some(until) = query.filter.range.until {
        sql.push_str(" AND timestamp <= ?");
        values.push(Value::Integer(until));
    }

    sql.push_str(match query.sort {
        Some(SortDirection::Ascending) => " ORDER BY timestamp ASC, id ASC",
        Some(SortDirection::Descending) => " ORDER BY timestamp DESC, id DESC",
        None => " ORDER BY id ASC",
    });

    // SQLite needs a LIMIT to accept an OFFSET; -1 means unbounded.
    sql.push_str(" LIMIT ? OFFSET ?");
    let limit = query
        .limit
        .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
        .unwrap_or(-1);
    values.push(Value::Integer(limit));
    values.push(Value::Integer(
        i64::try_from(query.skip).unwrap_or(i64::MAX),
    ));

    (sql, values)
}

fn map_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sample> {
    Ok(Sample {
        instrument_id: row.get(0)?,
        popularity: row.get(1)?,
        timestamp: row.get(2)?,
    })
}

#[async_trait::async_trait]
impl SampleStore for PopularityDb {
    async fn query(&self, query: &SampleQuery) -> Result<Vec<Sample>> {
        let (sql, values) = build_sample_query(query);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), map_sample)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn latest_per_instrument(&self, range: &TimeRange) -> Result<Vec<Sample>> {
        let (since, until) = range_bounds(range);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(LATEST_PER_INSTRUMENT_SQL)?;
            let rows = stmt.query_map(params![since, until], map_sample)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn window_bounds(&self, range: &TimeRange) -> Result<Vec<WindowBounds>> {
        let (since, until) = range_bounds(range);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(WINDOW_BOUNDS_SQL)?;
            let rows = stmt.query_map(params![since, until], |row| {
                Ok(WindowBounds {
                    instrument_id: row.get(0)?,
                    start_popularity: row.get(1)?,
                    end_popularity: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn count_distinct_instruments(&self, range: &TimeRange) -> Result<u64> {
        let (since, until) = range_bounds(range);
        self.with_conn(move |conn| {
            let count: i64 =
                conn.query_row(COUNT_DISTINCT_SQL, params![since, until], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[async_trait::async_trait]
impl InstrumentDirectory for PopularityDb {
    async fn resolve_symbol(&self, instrument_id: &str) -> Result<Option<String>> {
        let instrument_id = instrument_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare_cached("SELECT symbol FROM instruments WHERE instrument_id = ?1")?;
            let mut rows = stmt.query([&instrument_id])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            Ok(Some(row.get(0)?))
        })
        .await
    }

    async fn resolve_instrument(&self, symbol: &str) -> Result<Option<String>> {
        let symbol = symbol.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare_cached("SELECT instrument_id FROM instruments WHERE symbol = ?1")?;
            let mut rows = stmt.query([&symbol])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            Ok(Some(row.get(0)?))
        })
        .await
    }

    async fn resolve_symbols(&self, instrument_ids: &[String]) -> Result<HashMap<String, String>> {
        if instrument_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = instrument_ids.to_vec();
        self.with_conn(move |conn| {
            let mut map = HashMap::with_capacity(ids.len());
            for chunk in ids.chunks(SYMBOL_LOOKUP_CHUNK) {
                let placeholders = std::iter::repeat("?")
                    .take(chunk.len())
                    .collect::<Vec<_>>()
                    .join(",");
                let sql = format!(
                    "SELECT instrument_id, symbol FROM instruments WHERE instrument_id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
                while let Some(row) = rows.next()? {
                    map.insert(row.get(0)?, row.get(1)?);
                }
            }
            Ok(map)
        })
        .await
    }
}
