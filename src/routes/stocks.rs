use std::future::Future;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{FairValueReport, HealthSummary, MetricHistoryReport, PeersReport, SectorPercentilesReport};
use crate::services::insight_coordinator::InsightError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:ticker/sector-percentiles", get(get_sector_percentiles))
        .route("/:ticker/fair-value", get(get_fair_value))
        .route("/:ticker/health-summary", get(get_health_summary))
        .route("/:ticker/metric-history/:metric", get(get_metric_history))
        .route("/:ticker/peers", get(get_peers))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: Value,
}

fn respond<T: Serialize>(data: T, meta: Value) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data, meta })
}

/// Run one insight request under the configured deadline.
async fn bounded<T, F>(state: &AppState, ticker: &str, request: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, InsightError>>,
{
    let secs = state.insights.config().request_timeout_secs;
    match tokio::time::timeout(Duration::from_secs(secs), request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            match &e {
                InsightError::Source(_) => error!("Insight request for {} failed: {}", ticker, e),
                _ => warn!("Insight request for {} rejected: {}", ticker, e),
            }
            Err(e.into())
        }
        Err(_) => {
            error!("Insight request for {} timed out after {}s", ticker, secs);
            Err(AppError::Timeout(secs))
        }
    }
}

/// Non-numeric or out-of-range limits fall back to the endpoint default.
fn parse_limit(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, Deserialize)]
pub struct SectorPercentilesQuery {
    pub metrics: Option<String>,
}

pub async fn get_sector_percentiles(
    Path(ticker): Path<String>,
    Query(query): Query<SectorPercentilesQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SectorPercentilesReport>>, AppError> {
    info!("GET /stocks/{}/sector-percentiles - Getting sector percentiles", ticker);

    let filter: Vec<String> = query
        .metrics
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    let report = bounded(&state, &ticker, state.insights.sector_percentiles(&ticker, &filter)).await?;
    let meta = json!({
        "source": "mv_latest_sector_percentiles",
        "metric_count": report.metrics.len(),
        "timestamp": Utc::now(),
    });
    Ok(respond(report, meta))
}

pub async fn get_fair_value(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<FairValueReport>>, AppError> {
    info!("GET /stocks/{}/fair-value - Getting fair value estimates", ticker);

    let report = bounded(&state, &ticker, state.insights.fair_value(&ticker)).await?;
    let meta = json!({
        "models_available": report.models.len(),
        "timestamp": Utc::now(),
    });
    Ok(respond(report, meta))
}

pub async fn get_health_summary(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HealthSummary>>, AppError> {
    info!("GET /stocks/{}/health-summary - Getting health summary", ticker);

    let summary = bounded(&state, &ticker, state.insights.health_summary(&ticker)).await?;
    let meta = json!({
        "sources_available": summary.sources_available,
        "data_quality": summary.data_quality,
        "timestamp": Utc::now(),
    });
    Ok(respond(summary, meta))
}

#[derive(Debug, Deserialize)]
pub struct MetricHistoryQuery {
    pub timeframe: Option<String>,
    pub limit: Option<String>,
}

pub async fn get_metric_history(
    Path((ticker, metric)): Path<(String, String)>,
    Query(query): Query<MetricHistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MetricHistoryReport>>, AppError> {
    info!("GET /stocks/{}/metric-history/{} - Getting metric history", ticker, metric);

    let request = state.insights.metric_history(
        &ticker,
        &metric,
        query.timeframe.as_deref(),
        parse_limit(query.limit.as_deref()),
    );
    let report = bounded(&state, &ticker, request).await?;
    let meta = json!({
        "data_points": report.data_points.len(),
        "timestamp": Utc::now(),
    });
    Ok(respond(report, meta))
}

#[derive(Debug, Deserialize)]
pub struct PeersQuery {
    pub limit: Option<String>,
}

pub async fn get_peers(
    Path(ticker): Path<String>,
    Query(query): Query<PeersQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PeersReport>>, AppError> {
    info!("GET /stocks/{}/peers - Getting peer comparison", ticker);

    let request = state.insights.peers(&ticker, parse_limit(query.limit.as_deref()));
    let report = bounded(&state, &ticker, request).await?;
    let meta = json!({
        "peer_count": report.peers.len(),
        "timestamp": Utc::now(),
    });
    Ok(respond(report, meta))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{self, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt; // for `oneshot`

    use crate::app::create_app;
    use crate::config::InsightConfig;
    use crate::services::insight_coordinator::tests::{populated_store, profile, FakeStore};
    use crate::services::insight_coordinator::InsightCoordinator;
    use crate::state::AppState;

    fn app_with(store: FakeStore) -> axum::Router {
        let coordinator = InsightCoordinator::new(Arc::new(store), None, InsightConfig::default());
        create_app(AppState::new(coordinator))
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_summary_envelope() {
        let (status, body) = get_json(app_with(populated_store()), "/api/stocks/acme/health-summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["ticker"], "ACME");
        // no market data provider configured: 4 of 5 sources
        assert_eq!(body["meta"]["sources_available"], 4);
        assert_eq!(body["meta"]["data_quality"], "full");
        assert_eq!(body["data"]["strengths"][0]["metric"], "roe");
    }

    #[tokio::test]
    async fn test_sector_percentiles_filter_param() {
        let (status, body) = get_json(
            app_with(populated_store()),
            "/api/stocks/ACME/sector-percentiles?metrics=roe,%20debt_to_equity",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["metric_count"], 2);
        assert_eq!(body["data"]["metrics"]["debt_to_equity"]["percentile"], 5.0);
    }

    #[tokio::test]
    async fn test_untracked_filter_metric_is_bad_request() {
        let (status, body) = get_json(
            app_with(populated_store()),
            "/api/stocks/ACME/sector-percentiles?metrics=roe,vibes",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().unwrap().contains("vibes"));
    }

    #[tokio::test]
    async fn test_missing_sector_is_unprocessable() {
        let mut store = populated_store();
        store.profile = Some(profile(None));
        let (status, body) = get_json(app_with(store), "/api/stocks/ACME/health-summary").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "sector_unavailable");
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_found() {
        let (status, body) = get_json(app_with(FakeStore::default()), "/api/stocks/NOPE/peers").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_unknown_metric_is_bad_request() {
        let (status, body) = get_json(
            app_with(populated_store()),
            "/api/stocks/ACME/metric-history/ebitda?timeframe=annual&limit=abc",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("revenue"));
    }

    #[tokio::test]
    async fn test_fair_value_suppressed_without_inputs() {
        let (status, body) = get_json(app_with(populated_store()), "/api/stocks/ACME/fair-value").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["suppressed"], true);
        assert!(body["data"]["margin_of_safety"].is_null());
        assert_eq!(body["meta"]["models_available"], 0);
    }
}
