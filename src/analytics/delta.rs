//! Window deltas: popularity movers over an arbitrary lookback.
//!
//! For each instrument with samples in the window, the oldest in-window sample
//! is the start and the newest is the end. The difference is either absolute
//! (`end - start`) or a percentage of the start, which is undefined when the
//! start is zero. Undefined differences always sort after defined ones so a
//! divide-by-zero never sits at the top of a page.

use super::{
    error::EngineResult,
    query::{cmp_by_symbol, Page, SortDirection, TimeRange},
    PopularityEngine,
};
use crate::{models::DeltaEntry, store::WindowBounds};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

/// The three mover views served over the same delta primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoverKind {
    /// Largest `|difference|` first.
    LargestChanges,
    /// Most negative difference first.
    LargestDecreases,
    /// Most positive difference first.
    LargestIncreases,
}

impl MoverKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LargestChanges => "largest_changes",
            Self::LargestDecreases => "largest_decreases",
            Self::LargestIncreases => "largest_increases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeltaQuery {
    pub hours_ago: u32,
    pub direction: SortDirection,
    pub page: Page,
    pub use_percentage: bool,
    /// Drop instruments whose start popularity is below this.
    pub min_start_popularity: Option<i64>,
    pub take_absolute_value: bool,
}

impl DeltaQuery {
    pub fn preset(kind: MoverKind, hours_ago: u32, page: Page) -> Self {
        let (direction, take_absolute_value) = match kind {
            MoverKind::LargestChanges => (SortDirection::Descending, true),
            MoverKind::LargestDecreases => (SortDirection::Ascending, false),
            MoverKind::LargestIncreases => (SortDirection::Descending, false),
        };
        Self {
            hours_ago,
            direction,
            page,
            use_percentage: false,
            min_start_popularity: None,
            take_absolute_value,
        }
    }

    pub fn largest_changes(hours_ago: u32, page: Page) -> Self {
        Self::preset(MoverKind::LargestChanges, hours_ago, page)
    }

    pub fn largest_decreases(hours_ago: u32, page: Page) -> Self {
        Self::preset(MoverKind::LargestDecreases, hours_ago, page)
    }

    pub fn largest_increases(hours_ago: u32, page: Page) -> Self {
        Self::preset(MoverKind::LargestIncreases, hours_ago, page)
    }

    pub fn percentage(mut self, use_percentage: bool) -> Self {
        self.use_percentage = use_percentage;
        self
    }

    pub fn min_start_popularity(mut self, min: Option<i64>) -> Self {
        self.min_start_popularity = min;
        self
    }
}

/// Difference between window start and end. `None` when the percentage form
/// starts from zero.
pub fn difference(start: i64, end: i64, use_percentage: bool) -> Option<f64> {
    let change = end as f64 - start as f64;
    if !use_percentage {
        return Some(change);
    }
    if start == 0 {
        return None;
    }
    Some(100.0 * change / start as f64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SortKey {
    Defined(f64),
    Undefined,
}

impl SortKey {
    fn of(entry: &DeltaEntry, take_absolute_value: bool) -> Self {
        match entry.difference {
            Some(d) if take_absolute_value => Self::Defined(d.abs()),
            Some(d) => Self::Defined(d),
            None => Self::Undefined,
        }
    }
}

/// Defined keys follow `direction`; undefined keys go last either way.
fn compare_keys(a: SortKey, b: SortKey, direction: SortDirection) -> Ordering {
    match (a, b) {
        (SortKey::Defined(x), SortKey::Defined(y)) => direction.apply(x.total_cmp(&y)),
        (SortKey::Defined(_), SortKey::Undefined) => Ordering::Less,
        (SortKey::Undefined, SortKey::Defined(_)) => Ordering::Greater,
        (SortKey::Undefined, SortKey::Undefined) => Ordering::Equal,
    }
}

pub(crate) fn sort_deltas(entries: &mut [DeltaEntry], direction: SortDirection, take_abs: bool) {
    entries.sort_by(|a, b| {
        compare_keys(SortKey::of(a, take_abs), SortKey::of(b, take_abs), direction).then_with(
            || {
                cmp_by_symbol(
                    a.symbol.as_deref(),
                    &a.instrument_id,
                    b.symbol.as_deref(),
                    &b.instrument_id,
                )
            },
        )
    });
}

impl PopularityEngine {
    pub async fn delta(&self, query: &DeltaQuery, now: i64) -> EngineResult<Vec<DeltaEntry>> {
        let range = TimeRange::last_hours(now, query.hours_ago);
        let bounds = self
            .upstream("window_bounds", self.store.window_bounds(&range))
            .await?;
        let in_window = bounds.len();

        let bounds: Vec<WindowBounds> = match query.min_start_popularity {
            Some(min) => bounds
                .into_iter()
                .filter(|b| b.start_popularity >= min)
                .collect(),
            None => bounds,
        };

        let ids: Vec<String> = bounds.iter().map(|b| b.instrument_id.clone()).collect();
        let mut symbols = if ids.is_empty() {
            Default::default()
        } else {
            self.upstream("resolve_symbols", self.directory.resolve_symbols(&ids))
                .await?
        };

        let mut entries: Vec<DeltaEntry> = bounds
            .into_iter()
            .map(|b| DeltaEntry {
                symbol: symbols.remove(&b.instrument_id),
                difference: difference(b.start_popularity, b.end_popularity, query.use_percentage),
                instrument_id: b.instrument_id,
                start_popularity: b.start_popularity,
                end_popularity: b.end_popularity,
            })
            .collect();

        sort_deltas(&mut entries, query.direction, query.take_absolute_value);
        let page = query.page.apply(entries);

        debug!(
            hours_ago = query.hours_ago,
            direction = query.direction.as_str(),
            use_percentage = query.use_percentage,
            take_absolute_value = query.take_absolute_value,
            min_start_popularity = ?query.min_start_popularity,
            in_window,
            returned = page.len(),
            "popularity delta"
        );
        Ok(page)
    }
}
