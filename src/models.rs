//! Popularity data model
//!
//! Raw samples and instrument records come from the store; everything else is
//! derived per query and never persisted.

use serde::{Deserialize, Serialize};

/// One timestamped popularity observation for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub instrument_id: String,
    pub popularity: i64,
    /// UNIX seconds
    pub timestamp: i64,
}

impl Sample {
    pub fn new(instrument_id: impl Into<String>, popularity: i64, timestamp: i64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            popularity,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub instrument_id: String,
    pub symbol: String,
}

/// Newest in-window sample of one instrument, joined to its symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentPopularity {
    pub instrument_id: String,
    pub symbol: Option<String>,
    pub latest_popularity: i64,
    pub timestamp: i64,
}

/// A row of the popularity ranking. The rank is implied by page position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    pub symbol: Option<String>,
    pub popularity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankLookup {
    pub symbol: String,
    /// 1-based position in the descending ranking
    pub rank: usize,
}

/// Change in popularity between the oldest and newest in-window samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaEntry {
    pub instrument_id: String,
    pub symbol: Option<String>,
    pub start_popularity: i64,
    pub end_popularity: i64,
    /// `None` only for percentage deltas starting from zero.
    pub difference: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularityHistogram {
    pub min_popularity: i64,
    pub max_popularity: i64,
    pub bucket_width: f64,
    pub buckets: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub popularity: i64,
}

/// Popularity time series for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularityHistory {
    pub symbol: String,
    pub instrument_id: String,
    pub points: Vec<HistoryPoint>,
}
