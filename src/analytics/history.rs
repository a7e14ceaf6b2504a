//! Historical popularity series per symbol.

use super::{
    error::{EngineError, EngineResult},
    query::{SampleQuery, TimeRange},
    PopularityEngine,
};
use crate::models::{HistoryPoint, PopularityHistory};
use std::collections::HashSet;
use tracing::debug;

impl PopularityEngine {
    /// Samples for each symbol, oldest first, restricted to the last
    /// `hours_ago` hours when given. Symbols keep request order; repeats are
    /// served once. Any unknown symbol fails the whole call.
    pub async fn history(
        &self,
        symbols: &[String],
        hours_ago: Option<u32>,
        now: i64,
    ) -> EngineResult<Vec<PopularityHistory>> {
        if symbols.is_empty() {
            return Err(EngineError::InvalidParameter(
                "at least one symbol is required".to_string(),
            ));
        }

        let range = match hours_ago {
            Some(hours) => TimeRange::last_hours(now, hours),
            None => TimeRange {
                since: None,
                until: Some(now),
            },
        };

        let mut seen = HashSet::with_capacity(symbols.len());
        let mut resolved = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            let instrument_id = self
                .upstream("resolve_instrument", self.directory.resolve_instrument(symbol))
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("unknown symbol {symbol}")))?;
            resolved.push((symbol.clone(), instrument_id));
        }

        // Sequential round trips; nothing is returned until every series is read.
        let mut series = Vec::with_capacity(resolved.len());
        for (symbol, instrument_id) in resolved {
            let query = SampleQuery::for_instrument(&instrument_id, range);
            let points: Vec<HistoryPoint> = self
                .upstream("query", self.store.query(&query))
                .await?
                .into_iter()
                .map(|s| HistoryPoint {
                    timestamp: s.timestamp,
                    popularity: s.popularity,
                })
                .collect();

            debug!(%symbol, %instrument_id, points = points.len(), "popularity history");
            series.push(PopularityHistory {
                symbol,
                instrument_id,
                points,
            });
        }

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::engine_with;
    use crate::models::Sample;

    const NOW: i64 = 1_700_000_000;

    fn engine() -> PopularityEngine {
        engine_with(
            &[
                Sample::new("i1", 3, NOW - 7200),
                Sample::new("i1", 1, NOW - 10_000),
                Sample::new("i1", 2, NOW - 9000),
                Sample::new("i1", 9, NOW + 60),
                Sample::new("i2", 50, NOW - 30),
            ],
            &[("i1", "AAPL"), ("i2", "TSLA"), ("i3", "IPO")],
        )
    }

    fn owned(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_history_sorted_and_windowed() {
        let engine = engine();
        let all = engine.history(&owned(&["AAPL"]), None, NOW).await.unwrap();
        let popularity: Vec<i64> = all[0].points.iter().map(|p| p.popularity).collect();
        // future sample excluded, oldest first
        assert_eq!(popularity, vec![1, 2, 3]);

        let recent = engine
            .history(&owned(&["AAPL"]), Some(2), NOW)
            .await
            .unwrap();
        assert_eq!(recent[0].points.len(), 1);
        assert_eq!(recent[0].points[0].timestamp, NOW - 7200);
    }

    #[tokio::test]
    async fn test_history_multiple_symbols_in_request_order() {
        let series = engine()
            .history(&owned(&["TSLA", "AAPL", "TSLA", "IPO"]), None, NOW)
            .await
            .unwrap();
        let names: Vec<&str> = series.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(names, vec!["TSLA", "AAPL", "IPO"]);
        // known symbol without samples gives an empty series
        assert!(series[2].points.is_empty());
    }

    #[tokio::test]
    async fn test_history_unknown_symbol() {
        let err = engine()
            .history(&owned(&["AAPL", "NOPE"]), None, NOW)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NotFound("unknown symbol NOPE".to_string()));
    }
}
