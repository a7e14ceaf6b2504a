//! Popularity Analytics
//!
//! Rankings, movers, histograms and history over per-instrument popularity
//! samples. The engine lives in `analytics`; `store` provides the SQLite
//! sample store and instrument directory; `api` is the HTTP surface.

pub mod analytics;
pub mod api;
pub mod config;
pub mod middleware;
pub mod models;
pub mod store;

pub use analytics::{EngineConfig, EngineError, PopularityEngine};
pub use store::PopularityDb;
