//! Query stage parameters
//!
//! Every engine operation is built from the same stages: filter samples by
//! instrument and time, group per instrument, join symbols, sort, paginate.
//! Each stage takes one of the explicit parameter objects below.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

const SECONDS_PER_HOUR: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Orient an ascending comparison result in this direction.
    #[inline]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Inclusive bounds on sample timestamps (UNIX seconds). `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl TimeRange {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn last_hours(now: i64, hours_ago: u32) -> Self {
        Self {
            since: Some(now - i64::from(hours_ago) * SECONDS_PER_HOUR),
            until: Some(now),
        }
    }

    pub fn recent(now: i64, window: Duration) -> Self {
        let secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        Self {
            since: Some(now.saturating_sub(secs)),
            until: Some(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleFilter {
    pub instrument_id: Option<String>,
    pub range: TimeRange,
}

/// Raw sample query: filter, optional timestamp sort, then skip/limit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleQuery {
    pub filter: SampleFilter,
    pub sort: Option<SortDirection>,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl SampleQuery {
    pub fn for_instrument(instrument_id: &str, range: TimeRange) -> Self {
        Self {
            filter: SampleFilter {
                instrument_id: Some(instrument_id.to_string()),
                range,
            },
            sort: Some(SortDirection::Ascending),
            limit: None,
            skip: 0,
        }
    }
}

/// Pagination window over an already sorted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub start_index: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(start_index: usize, limit: usize) -> Self {
        Self { start_index, limit }
    }

    /// Everything from the first entry on.
    pub fn all() -> Self {
        Self::new(0, usize::MAX)
    }

    pub fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.start_index)
            .take(self.limit)
            .collect()
    }
}

/// Symbol tie-break: ascending, unresolved symbols after all resolved ones,
/// instrument id last so the order is total.
pub fn cmp_by_symbol(
    a_symbol: Option<&str>,
    a_instrument: &str,
    b_symbol: Option<&str>,
    b_instrument: &str,
) -> Ordering {
    let by_symbol = match (a_symbol, b_symbol) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_symbol.then_with(|| a_instrument.cmp(b_instrument))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let items: Vec<u32> = (0..5).collect();
        assert_eq!(Page::new(1, 2).apply(items.clone()), vec![1, 2]);
        assert!(Page::new(0, 0).apply(items.clone()).is_empty());
        assert!(Page::new(10, 3).apply(items.clone()).is_empty());
        assert_eq!(Page::new(3, 100).apply(items), vec![3, 4]);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Descending));
        assert_eq!(SortDirection::parse(" asc "), Some(SortDirection::Ascending));
        assert_eq!(SortDirection::parse("ascending"), Some(SortDirection::Ascending));
        assert_eq!(SortDirection::parse("up"), None);
    }

    #[test]
    fn test_unresolved_symbols_sort_last() {
        assert_eq!(cmp_by_symbol(Some("ZZZ"), "1", None, "0"), Ordering::Less);
        assert_eq!(cmp_by_symbol(None, "a", None, "b"), Ordering::Less);
        assert_eq!(cmp_by_symbol(Some("AAA"), "9", Some("BBB"), "1"), Ordering::Less);
    }

    #[test]
    fn test_time_range_inclusive() {
        let range = TimeRange::last_hours(10_000, 1);
        assert_eq!((range.since, range.until), (Some(6_400), Some(10_000)));
        assert_eq!(TimeRange::all_time(), TimeRange { since: None, until: None });
    }
}
