//! HTTP routes driven in-process through the router.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use popularity_analytics::{
    api::{create_router, ApiLimits, ApiState, ResponseCache},
    models::{InstrumentRecord, Sample},
    EngineConfig, PopularityDb, PopularityEngine,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with(db: Arc<PopularityDb>, cache_ttl: Duration) -> Router {
    let engine = PopularityEngine::new(db.clone(), db, EngineConfig::default());
    create_router(ApiState {
        engine,
        cache: Arc::new(ResponseCache::new(cache_ttl)),
        limits: ApiLimits {
            max_page: 3,
            max_buckets: 8,
        },
    })
}

fn seeded_db() -> Arc<PopularityDb> {
    let now = Utc::now().timestamp();
    let db = PopularityDb::new(":memory:").unwrap();
    db.insert_samples(&[
        Sample::new("i-aapl", 100, now - 20 * 3600),
        Sample::new("i-aapl", 150, now - 60),
        Sample::new("i-tsla", 300, now - 20 * 3600),
        Sample::new("i-tsla", 200, now - 60),
        Sample::new("i-gme", 0, now - 20 * 3600),
        Sample::new("i-gme", 40, now - 60),
        Sample::new("i-amc", 40, now - 60),
        Sample::new("i-old", 999, now - 72 * 3600),
    ])
    .unwrap();
    for (id, symbol) in [
        ("i-aapl", "AAPL"),
        ("i-tsla", "TSLA"),
        ("i-gme", "GME"),
        ("i-amc", "AMC"),
        ("i-old", "OLD"),
    ] {
        db.upsert_instrument(&InstrumentRecord {
            instrument_id: id.to_string(),
            symbol: symbol.to_string(),
        })
        .unwrap();
    }
    Arc::new(db)
}

fn app() -> Router {
    app_with(seeded_db(), Duration::from_secs(60))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn symbols(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["symbol"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn health() {
    let (status, body) = get(&app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn top_is_ranked_and_clamped_to_max_page() {
    let app = app();
    let (status, body) = get(&app, "/api/popularity/top?limit=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(symbols(&body["entries"]), vec!["TSLA", "AAPL", "AMC"]);
    assert_eq!(body["entries"][0]["rank"], 1);

    let (_, body) = get(&app, "/api/popularity/top?direction=asc&start_index=1&limit=2").await;
    assert_eq!(symbols(&body["entries"]), vec!["GME", "AAPL"]);
    assert_eq!(body["entries"][0]["rank"], 2);
}

#[tokio::test]
async fn top_rejects_bad_parameters() {
    let app = app();
    let (status, _) = get(&app, "/api/popularity/top?direction=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/popularity/top?start_index=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/popularity/top?limit=ten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rank_lookup() {
    let app = app();
    let (status, body) = get(&app, "/api/popularity/rank?symbol=aapl").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["rank"], 2);

    let (status, body) = get(&app, "/api/popularity/rank?symbol=OLD").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("OLD"));
}

#[tokio::test]
async fn instrument_counts() {
    let app = app();
    let (_, all) = get(&app, "/api/instruments/count").await;
    let (_, recent) = get(&app, "/api/instruments/count?hours_ago=1").await;
    assert_eq!(all["count"], 5);
    assert_eq!(recent["count"], 4);
}

#[tokio::test]
async fn movers_views() {
    let app = app();

    let (status, body) = get(&app, "/api/popularity/changes?hours_ago=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "largest_changes");
    assert_eq!(symbols(&body["entries"]), vec!["TSLA", "AAPL", "GME"]);
    assert_eq!(body["entries"][0]["difference"], -100.0);

    let (_, body) = get(&app, "/api/popularity/increases?hours_ago=24").await;
    assert_eq!(symbols(&body["entries"]), vec!["AAPL", "GME", "AMC"]);

    let (_, body) = get(&app, "/api/popularity/decreases?hours_ago=24&limit=1").await;
    assert_eq!(symbols(&body["entries"]), vec!["TSLA"]);

    let (_, body) = get(
        &app,
        "/api/popularity/increases?hours_ago=24&percentage=true",
    )
    .await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(symbols(&body["entries"]), vec!["AAPL", "AMC", "TSLA"]);
    assert!(entries.iter().all(|e| !e["difference"].is_null()));

    let (_, body) = get(
        &app,
        "/api/popularity/increases?hours_ago=24&percentage=true&start_index=3",
    )
    .await;
    assert_eq!(symbols(&body["entries"]), vec!["GME"]);
    assert!(body["entries"][0]["difference"].is_null());

    let (_, body) = get(&app, "/api/popularity/changes?hours_ago=24&min_popularity=100").await;
    assert_eq!(symbols(&body["entries"]), vec!["TSLA", "AAPL"]);
}

#[tokio::test]
async fn histogram_validation_and_result() {
    let app = app();
    let (status, body) = get(&app, "/api/popularity/histogram?buckets=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["min_popularity"], 40);
    assert_eq!(body["max_popularity"], 200);
    let total: u64 = body["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b.as_u64().unwrap())
        .sum();
    assert_eq!(total, 4);

    let (status, _) = get(&app, "/api/popularity/histogram?buckets=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(&app, "/api/popularity/histogram?buckets=9").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn histogram_without_recent_data() {
    let app = app_with(
        Arc::new(PopularityDb::new(":memory:").unwrap()),
        Duration::ZERO,
    );
    let (status, body) = get(&app, "/api/popularity/histogram?buckets=4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("empty dataset"));
}

#[tokio::test]
async fn history_for_symbol_list() {
    let app = app();
    let (status, body) = get(&app, "/api/popularity/history?symbols=tsla,aapl").await;
    assert_eq!(status, StatusCode::OK);
    let series = body["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["symbol"], "TSLA");
    let points: Vec<i64> = series[0]["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["popularity"].as_i64().unwrap())
        .collect();
    assert_eq!(points, vec![300, 200]);

    let (_, body) = get(&app, "/api/popularity/history?symbols=TSLA&hours_ago=1").await;
    assert_eq!(body["series"][0]["points"].as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/api/popularity/history?symbols=TSLA,NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/popularity/history?symbols=,").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_are_served_from_cache_within_ttl() {
    let db = seeded_db();
    let app = app_with(db.clone(), Duration::from_secs(60));

    let (_, first) = get(&app, "/api/instruments/count").await;
    db.insert_sample(&Sample::new("i-new", 1, Utc::now().timestamp() - 5))
        .unwrap();
    let (_, cached) = get(&app, "/api/instruments/count").await;
    assert_eq!(first, cached);

    let uncached = app_with(db, Duration::ZERO);
    let (_, fresh) = get(&uncached, "/api/instruments/count").await;
    assert_eq!(fresh["count"], 6);
}
