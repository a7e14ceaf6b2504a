//! HTTP surface over the popularity engine.
//!
//! Parameter validation and response caching live here; the engine itself
//! only ever sees well-typed, range-checked inputs.

pub mod cache;
pub mod error;
pub mod routes;

pub use cache::ResponseCache;
pub use error::ApiError;
pub use routes::create_router;

use crate::analytics::PopularityEngine;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ApiLimits {
    /// Largest page a caller may request; bigger limits are clamped.
    pub max_page: usize,
    pub max_buckets: usize,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_page: 500,
            max_buckets: 1000,
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub engine: PopularityEngine,
    pub cache: Arc<ResponseCache>,
    pub limits: ApiLimits,
}
