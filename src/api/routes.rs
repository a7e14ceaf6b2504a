use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

use super::{error::ApiError, ApiState};
use crate::{
    analytics::{
        delta::MoverKind, DeltaQuery, EngineError, EngineResult, Page, SortDirection,
    },
    models::{DeltaEntry, PopularityHistogram, PopularityHistory, RankLookup},
};

const DEFAULT_PAGE_LIMIT: usize = 50;
const DEFAULT_MOVERS_HOURS: u32 = 24;
const DEFAULT_HISTOGRAM_BUCKETS: usize = 10;
const MAX_HISTORY_SYMBOLS: usize = 50;

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/popularity/top", get(get_top))
        .route("/api/popularity/rank", get(get_rank))
        .route("/api/popularity/history", get(get_history))
        .route("/api/popularity/changes", get(get_largest_changes))
        .route("/api/popularity/decreases", get(get_largest_decreases))
        .route("/api/popularity/increases", get(get_largest_increases))
        .route("/api/popularity/histogram", get(get_histogram))
        .route("/api/instruments/count", get(get_instrument_count))
        .with_state(state)
}

// ===== Query Parameters =====

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    /// "asc" or "desc" (default)
    pub direction: Option<String>,
    pub limit: Option<usize>,
    pub start_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RankQuery {
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Comma-separated symbols
    pub symbols: String,
    pub hours_ago: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub hours_ago: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MoversQuery {
    pub hours_ago: Option<u32>,
    pub limit: Option<usize>,
    pub start_index: Option<usize>,
    /// Percentage change instead of absolute
    pub percentage: Option<bool>,
    /// Minimum popularity at window start
    pub min_popularity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistogramQuery {
    pub buckets: Option<usize>,
}

// ===== Responses =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    pub symbol: Option<String>,
    pub popularity: i64,
}

#[derive(Debug, Serialize)]
pub struct TopResponse {
    pub direction: SortDirection,
    pub start_index: usize,
    pub count: usize,
    pub entries: Vec<RankedRow>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub hours_ago: Option<u32>,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct MoversResponse {
    pub kind: MoverKind,
    pub hours_ago: u32,
    pub percentage: bool,
    pub count: usize,
    pub entries: Vec<DeltaEntry>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub hours_ago: Option<u32>,
    pub series: Vec<PopularityHistory>,
}

// ===== Validation =====

fn page_params(state: &ApiState, start_index: Option<usize>, limit: Option<usize>) -> Page {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(state.limits.max_page);
    Page::new(start_index.unwrap_or(0), limit)
}

fn normalize_symbol(raw: &str) -> Result<String, ApiError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(format!("invalid symbol: {raw:?}")));
    }
    Ok(symbol)
}

fn parse_symbols(raw: &str) -> Result<Vec<String>, ApiError> {
    let symbols = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(normalize_symbol)
        .collect::<Result<Vec<_>, _>>()?;

    if symbols.is_empty() {
        return Err(ApiError::BadRequest("symbols must not be empty".to_string()));
    }
    if symbols.len() > MAX_HISTORY_SYMBOLS {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_HISTORY_SYMBOLS} symbols per request"
        )));
    }
    Ok(symbols)
}

/// Serve from the response cache, or run `compute` and remember its JSON.
async fn cached<T, F>(state: &ApiState, key: String, compute: F) -> Result<Json<Value>, ApiError>
where
    T: Serialize,
    F: Future<Output = EngineResult<T>>,
{
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }
    let value = serde_json::to_value(compute.await?)?;
    state.cache.insert(key, value.clone());
    Ok(Json(value))
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_top(
    State(state): State<ApiState>,
    Query(params): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    let direction = match params.direction.as_deref() {
        None => SortDirection::Descending,
        Some(raw) => SortDirection::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid direction: {raw:?}")))?,
    };
    let page = page_params(&state, params.start_index, params.limit);
    let key = format!(
        "top:{}:{}:{}",
        direction.as_str(),
        page.start_index,
        page.limit
    );
    let now = Utc::now().timestamp();

    cached(&state, key, async {
        let entries = state.engine.top_by_popularity(direction, page, now).await?;
        let entries: Vec<RankedRow> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedRow {
                rank: page.start_index + i + 1,
                symbol: e.symbol,
                popularity: e.popularity,
            })
            .collect();
        Ok::<_, EngineError>(TopResponse {
            direction,
            start_index: page.start_index,
            count: entries.len(),
            entries,
        })
    })
    .await
}

async fn get_rank(
    State(state): State<ApiState>,
    Query(params): Query<RankQuery>,
) -> Result<Json<Value>, ApiError> {
    let symbol = normalize_symbol(&params.symbol)?;
    let key = format!("rank:{symbol}");
    let now = Utc::now().timestamp();

    cached::<RankLookup, _>(&state, key, state.engine.rank_of(&symbol, now)).await
}

async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let symbols = parse_symbols(&params.symbols)?;
    let key = format!(
        "history:{}:{}",
        symbols.join(","),
        params
            .hours_ago
            .map(|h| h.to_string())
            .unwrap_or_else(|| "all".to_string())
    );
    let now = Utc::now().timestamp();

    cached(&state, key, async {
        let series = state.engine.history(&symbols, params.hours_ago, now).await?;
        Ok::<_, EngineError>(HistoryResponse {
            hours_ago: params.hours_ago,
            series,
        })
    })
    .await
}

async fn get_instrument_count(
    State(state): State<ApiState>,
    Query(params): Query<CountQuery>,
) -> Result<Json<Value>, ApiError> {
    let key = format!(
        "count:{}",
        params
            .hours_ago
            .map(|h| h.to_string())
            .unwrap_or_else(|| "all".to_string())
    );
    let now = Utc::now().timestamp();

    cached(&state, key, async {
        let count = state
            .engine
            .total_distinct_instruments(params.hours_ago, now)
            .await?;
        Ok::<_, EngineError>(CountResponse {
            hours_ago: params.hours_ago,
            count,
        })
    })
    .await
}

async fn movers(
    state: ApiState,
    kind: MoverKind,
    params: MoversQuery,
) -> Result<Json<Value>, ApiError> {
    let hours_ago = params.hours_ago.unwrap_or(DEFAULT_MOVERS_HOURS);
    let percentage = params.percentage.unwrap_or(false);
    let page = page_params(&state, params.start_index, params.limit);
    let query = DeltaQuery::preset(kind, hours_ago, page)
        .percentage(percentage)
        .min_start_popularity(params.min_popularity);

    let key = format!(
        "{}:{}:{}:{}:{}:{}",
        kind.as_str(),
        hours_ago,
        query.page.start_index,
        query.page.limit,
        percentage,
        query
            .min_start_popularity
            .map(|m| m.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    let now = Utc::now().timestamp();

    cached(&state, key, async {
        let entries = state.engine.delta(&query, now).await?;
        Ok::<_, EngineError>(MoversResponse {
            kind,
            hours_ago,
            percentage,
            count: entries.len(),
            entries,
        })
    })
    .await
}

async fn get_largest_changes(
    State(state): State<ApiState>,
    Query(params): Query<MoversQuery>,
) -> Result<Json<Value>, ApiError> {
    movers(state, MoverKind::LargestChanges, params).await
}

async fn get_largest_decreases(
    State(state): State<ApiState>,
    Query(params): Query<MoversQuery>,
) -> Result<Json<Value>, ApiError> {
    movers(state, MoverKind::LargestDecreases, params).await
}

async fn get_largest_increases(
    State(state): State<ApiState>,
    Query(params): Query<MoversQuery>,
) -> Result<Json<Value>, ApiError> {
    movers(state, MoverKind::LargestIncreases, params).await
}

async fn get_histogram(
    State(state): State<ApiState>,
    Query(params): Query<HistogramQuery>,
) -> Result<Json<Value>, ApiError> {
    let buckets = params.buckets.unwrap_or(DEFAULT_HISTOGRAM_BUCKETS);
    if buckets == 0 || buckets > state.limits.max_buckets {
        return Err(ApiError::BadRequest(format!(
            "buckets must be between 1 and {}",
            state.limits.max_buckets
        )));
    }
    let key = format!("histogram:{buckets}");
    let now = Utc::now().timestamp();

    cached::<PopularityHistogram, _>(&state, key, state.engine.histogram(buckets, now)).await
}
