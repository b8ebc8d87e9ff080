use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::external::fundamentals_source::SourceError;
use crate::services::insight_coordinator::InsightError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SectorUnavailable(String),
    #[error("Rate limited by external provider")]
    RateLimited,
    #[error("External error: {0}")]
    External(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SectorUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited => StatusCode::SERVICE_UNAVAILABLE,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Db(_) => "internal_error",
            AppError::Validation(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::SectorUnavailable(_) => "sector_unavailable",
            AppError::RateLimited => "rate_limited",
            AppError::External(_) => "upstream_error",
            AppError::Timeout(_) => "timeout",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Db(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({ "error": self.code(), "message": message }));

        if let AppError::RateLimited = self {
            let mut headers = HeaderMap::new();
            headers.insert("Retry-After", HeaderValue::from_static("60"));
            return (status, headers, body).into_response();
        }
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<SourceError> for AppError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::Database(e) => AppError::Db(e),
            SourceError::RateLimited => AppError::RateLimited,
            other => AppError::External(other.to_string()),
        }
    }
}

impl From<InsightError> for AppError {
    fn from(value: InsightError) -> Self {
        match value {
            InsightError::StockNotFound(_)
            | InsightError::NoPercentileData { .. }
            | InsightError::NoHistory { .. }
            | InsightError::MissingMarketCap(_) => AppError::NotFound(value.to_string()),
            InsightError::SectorUnavailable(_) => AppError::SectorUnavailable(value.to_string()),
            InsightError::UnknownMetric { ref valid, .. } => {
                AppError::Validation(format!("{}; valid metrics: {}", value, valid.join(", ")))
            }
            InsightError::InvalidTimeframe(_) => AppError::Validation(value.to_string()),
            InsightError::Source(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_errors_map_to_status() {
        let cases = [
            (InsightError::StockNotFound("ACME".into()), StatusCode::NOT_FOUND),
            (InsightError::SectorUnavailable("ACME".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (InsightError::InvalidTimeframe("monthly".into()), StatusCode::BAD_REQUEST),
            (InsightError::MissingMarketCap("ACME".into()), StatusCode::NOT_FOUND),
            (InsightError::Source(SourceError::RateLimited), StatusCode::SERVICE_UNAVAILABLE),
            (
                InsightError::Source(SourceError::Network("reset".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unknown_metric_lists_valid_names() {
        let err = AppError::from(InsightError::UnknownMetric {
            metric: "ebitda".into(),
            valid: vec!["eps", "revenue"],
        });
        match err {
            AppError::Validation(msg) => assert!(msg.ends_with("valid metrics: eps, revenue")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
