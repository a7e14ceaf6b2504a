//! Popularity Analytics Engine
//!
//! Read-only, windowed aggregations over raw popularity samples:
//! - Latest-value resolution (current popularity per instrument)
//! - Ranking, rank lookup and distinct-instrument counts
//! - Window deltas (largest movers)
//! - Histogram of current popularity
//! - Per-symbol popularity history
//!
//! Every operation is a pure function of store contents, parameters and `now`,
//! so results are safe to memoize by operation name and parameters.

pub mod delta;
pub mod error;
pub mod histogram;
pub mod history;
pub mod latest;
pub mod query;
pub mod ranking;

pub use delta::DeltaQuery;
pub use error::{EngineError, EngineResult};
pub use query::{Page, SortDirection, TimeRange};

use crate::store::{InstrumentDirectory, SampleStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CURRENT_WINDOW: Duration = Duration::from_secs(2 * 3600);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lookback that defines "current" popularity for rankings and histograms.
    pub current_window: Duration,
    /// Upper bound on every single store or directory call.
    pub query_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            current_window: DEFAULT_CURRENT_WINDOW,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Stateless query engine. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct PopularityEngine {
    store: Arc<dyn SampleStore>,
    directory: Arc<dyn InstrumentDirectory>,
    config: EngineConfig,
}

impl PopularityEngine {
    pub fn new(
        store: Arc<dyn SampleStore>,
        directory: Arc<dyn InstrumentDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Await a collaborator call under the configured timeout. Failures and
    /// timeouts both surface as `UpstreamUnavailable`.
    async fn upstream<T, F>(&self, what: &'static str, call: F) -> EngineResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.config.query_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(call = what, error = %e, "upstream call failed");
                Err(EngineError::UpstreamUnavailable(format!("{what}: {e:#}")))
            }
            Err(_) => {
                let ms = self.config.query_timeout.as_millis();
                warn!(call = what, timeout_ms = ms as u64, "upstream call timed out");
                Err(EngineError::UpstreamUnavailable(format!(
                    "{what} timed out after {ms}ms"
                )))
            }
        }
    }
}
