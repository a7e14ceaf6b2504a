//! Popularity analytics API server.

use anyhow::{Context, Result};
use axum::middleware;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use popularity_analytics::{
    api::{create_router, ApiState, ResponseCache},
    config::{load_env, Config},
    middleware::request_logging,
    PopularityDb, PopularityEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    let db_path = config.resolved_db_path();

    info!("🚀 Popularity analytics API starting");
    info!(
        current_window_secs = config.current_window_secs,
        query_timeout_ms = config.query_timeout_ms,
        cache_ttl_secs = config.cache_ttl_secs,
        "⚙️  Engine configuration"
    );

    let db = Arc::new(PopularityDb::new(&db_path)?);
    let engine = PopularityEngine::new(db.clone(), db, config.engine());

    let state = ApiState {
        engine,
        cache: Arc::new(ResponseCache::new(config.cache_ttl())),
        limits: config.limits(),
    };

    let app = create_router(state)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎯 API server listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "popularity_analytics=debug,popularity_api=debug";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
