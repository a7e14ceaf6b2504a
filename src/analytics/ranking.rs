//! Ranking of instruments by current popularity.

use super::{
    error::{EngineError, EngineResult},
    query::{cmp_by_symbol, Page, SortDirection, TimeRange},
    PopularityEngine,
};
use crate::models::{CurrentPopularity, RankLookup, RankingEntry};
use tracing::debug;

/// Sort by popularity in `direction`, ties by symbol ascending.
pub(crate) fn sort_by_popularity(entries: &mut [CurrentPopularity], direction: SortDirection) {
    entries.sort_by(|a, b| {
        direction
            .apply(a.latest_popularity.cmp(&b.latest_popularity))
            .then_with(|| {
                cmp_by_symbol(
                    a.symbol.as_deref(),
                    &a.instrument_id,
                    b.symbol.as_deref(),
                    &b.instrument_id,
                )
            })
    });
}

impl PopularityEngine {
    /// One page of the current popularity ranking.
    pub async fn top_by_popularity(
        &self,
        direction: SortDirection,
        page: Page,
        now: i64,
    ) -> EngineResult<Vec<RankingEntry>> {
        let mut entries = self.current_popularity(now).await?;
        sort_by_popularity(&mut entries, direction);

        let ranking: Vec<RankingEntry> = page
            .apply(entries)
            .into_iter()
            .map(|e| RankingEntry {
                symbol: e.symbol,
                popularity: e.latest_popularity,
            })
            .collect();

        debug!(
            direction = direction.as_str(),
            start_index = page.start_index,
            limit = page.limit,
            returned = ranking.len(),
            "top by popularity"
        );
        Ok(ranking)
    }

    /// 1-based position of `symbol` in the descending current ranking.
    pub async fn rank_of(&self, symbol: &str, now: i64) -> EngineResult<RankLookup> {
        let mut entries = self.current_popularity(now).await?;
        sort_by_popularity(&mut entries, SortDirection::Descending);

        let position = entries
            .iter()
            .position(|e| e.symbol.as_deref() == Some(symbol))
            .ok_or_else(|| {
                EngineError::NotFound(format!("no current popularity for symbol {symbol}"))
            })?;

        Ok(RankLookup {
            symbol: symbol.to_string(),
            rank: position + 1,
        })
    }

    /// Instruments with at least one sample in the last `hours_ago` hours,
    /// or ever if `hours_ago` is `None`.
    pub async fn total_distinct_instruments(
        &self,
        hours_ago: Option<u32>,
        now: i64,
    ) -> EngineResult<u64> {
        let range = match hours_ago {
            Some(hours) => TimeRange::last_hours(now, hours),
            None => TimeRange::all_time(),
        };
        let count = self
            .upstream(
                "count_distinct_instruments",
                self.store.count_distinct_instruments(&range),
            )
            .await?;

        debug!(?hours_ago, count, "distinct instruments");
        Ok(count)
    }
}
