//! Latest-value resolution: one current popularity per instrument.

use super::{error::EngineResult, query::TimeRange, PopularityEngine};
use crate::models::CurrentPopularity;
use std::time::Duration;
use tracing::debug;

impl PopularityEngine {
    /// Newest sample per instrument inside the configured recency window.
    pub async fn current_popularity(&self, now: i64) -> EngineResult<Vec<CurrentPopularity>> {
        self.resolve_latest(self.config.current_window, now).await
    }

    /// Newest sample per instrument with `timestamp >= now - window`, joined
    /// to its symbol. Instruments without a directory entry keep a `None`
    /// symbol. Output is ordered by instrument id.
    pub async fn resolve_latest(
        &self,
        window: Duration,
        now: i64,
    ) -> EngineResult<Vec<CurrentPopularity>> {
        let range = TimeRange::recent(now, window);
        let latest = self
            .upstream("latest_per_instrument", self.store.latest_per_instrument(&range))
            .await?;

        if latest.is_empty() {
            debug!(window_secs = window.as_secs(), "no samples in recency window");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = latest.iter().map(|s| s.instrument_id.clone()).collect();
        let mut symbols = self
            .upstream("resolve_symbols", self.directory.resolve_symbols(&ids))
            .await?;

        let entries: Vec<CurrentPopularity> = latest
            .into_iter()
            .map(|sample| CurrentPopularity {
                symbol: symbols.remove(&sample.instrument_id),
                instrument_id: sample.instrument_id,
                latest_popularity: sample.popularity,
                timestamp: sample.timestamp,
            })
            .collect();

        debug!(
            window_secs = window.as_secs(),
            instruments = entries.len(),
            "resolved current popularity"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::engine_with;
    use crate::models::Sample;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_latest_picks_newest_in_window() {
        let engine = engine_with(
            &[
                Sample::new("i1", 10, NOW - 3000),
                Sample::new("i1", 12, NOW - 60),
                Sample::new("i2", 99, NOW - 10_000),
                Sample::new("i3", 4, NOW - 100),
            ],
            &[("i1", "AAA"), ("i2", "BBB")],
        );

        let entries = engine.current_popularity(NOW).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].symbol.as_deref(), Some("AAA"));
        assert_eq!(entries[0].latest_popularity, 12);
        // i3 has no directory entry but still counts
        assert_eq!(entries[1].instrument_id, "i3");
        assert_eq!(entries[1].symbol, None);
    }

    #[tokio::test]
    async fn test_latest_empty_window_is_not_an_error() {
        let engine = engine_with(&[Sample::new("i1", 10, NOW - 100_000)], &[]);
        let entries = engine
            .resolve_latest(Duration::from_secs(60), NOW)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}
