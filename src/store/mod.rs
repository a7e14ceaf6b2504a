//! Sample store and instrument directory
//!
//! The engine only reads through these two traits. `PopularityDb` is the
//! SQLite-backed implementation of both.

pub mod sqlite;

pub use sqlite::PopularityDb;

use crate::{
    analytics::query::{SampleQuery, TimeRange},
    models::Sample,
};
use anyhow::Result;
use std::collections::HashMap;

/// First and last sample of one instrument inside a time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBounds {
    pub instrument_id: String,
    pub start_popularity: i64,
    pub end_popularity: i64,
}

/// Read access to append-only popularity samples.
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    async fn query(&self, query: &SampleQuery) -> Result<Vec<Sample>>;

    /// Newest sample per instrument within `range`.
    async fn latest_per_instrument(&self, range: &TimeRange) -> Result<Vec<Sample>>;

    /// Oldest and newest sample per instrument within `range`.
    async fn window_bounds(&self, range: &TimeRange) -> Result<Vec<WindowBounds>>;

    async fn count_distinct_instruments(&self, range: &TimeRange) -> Result<u64>;
}

/// `instrument_id <-> symbol` lookups.
#[async_trait::async_trait]
pub trait InstrumentDirectory: Send + Sync {
    async fn resolve_symbol(&self, instrument_id: &str) -> Result<Option<String>>;

    async fn resolve_instrument(&self, symbol: &str) -> Result<Option<String>>;

    /// Batch form of `resolve_symbol`. Unknown ids are simply absent.
    async fn resolve_symbols(&self, instrument_ids: &[String]) -> Result<HashMap<String, String>> {
        let mut symbols = HashMap::with_capacity(instrument_ids.len());
        for id in instrument_ids {
            if let Some(symbol) = self.resolve_symbol(id).await? {
                symbols.insert(id.clone(), symbol);
            }
        }
        Ok(symbols)
    }
}
