//! Equal-width histogram of current popularity.
//!
//! Width is `(max - min) / bucket_count`, and a value's bucket is
//! `floor(value / width)` clamped into `0..bucket_count`. The index is taken
//! from the raw value, not from `value - min`, which is the established
//! observable behavior of this view.

use super::{
    error::{EngineError, EngineResult},
    PopularityEngine,
};
use crate::models::PopularityHistogram;
use tracing::debug;

/// Bucket for `value`. A zero width (all values equal) puts everything in the
/// last bucket, where the maximum belongs.
pub fn bucket_index(value: i64, width: f64, bucket_count: usize) -> usize {
    let last = bucket_count.saturating_sub(1);
    if width <= 0.0 || !width.is_finite() {
        return last;
    }
    let raw = (value as f64 / width).floor();
    if raw <= 0.0 {
        0
    } else if raw >= last as f64 {
        last
    } else {
        raw as usize
    }
}

pub fn build_histogram(values: &[i64], bucket_count: usize) -> EngineResult<PopularityHistogram> {
    if bucket_count == 0 {
        return Err(EngineError::InvalidParameter(
            "bucket_count must be at least 1".to_string(),
        ));
    }
    let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
        return Err(EngineError::EmptyDataset(
            "no instrument has recent popularity data".to_string(),
        ));
    };

    let width = (max as f64 - min as f64) / bucket_count as f64;
    let mut buckets = vec![0u64; bucket_count];
    for &value in values {
        buckets[bucket_index(value, width, bucket_count)] += 1;
    }

    Ok(PopularityHistogram {
        min_popularity: min,
        max_popularity: max,
        bucket_width: width,
        buckets,
    })
}

impl PopularityEngine {
    pub async fn histogram(
        &self,
        bucket_count: usize,
        now: i64,
    ) -> EngineResult<PopularityHistogram> {
        // Reject before touching the store.
        if bucket_count == 0 {
            return Err(EngineError::InvalidParameter(
                "bucket_count must be at least 1".to_string(),
            ));
        }

        let values: Vec<i64> = self
            .current_popularity(now)
            .await?
            .into_iter()
            .map(|e| e.latest_popularity)
            .collect();

        let histogram = build_histogram(&values, bucket_count)?;
        debug!(
            bucket_count,
            entries = values.len(),
            min = histogram.min_popularity,
            max = histogram.max_popularity,
            "popularity histogram"
        );
        Ok(histogram)
    }
}
