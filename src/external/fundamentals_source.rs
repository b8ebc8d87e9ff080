use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    EnrichedPeer, FairValueMetrics, IcScore, LifecycleClassification, MetricDataPoint,
    MetricDistribution, MetricMapping, MetricValues, PeerSource, QualityScores, StockProfile,
    Timeframe,
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("rate limited")]
    RateLimited,
}

/// Precomputed fundamentals and reference data owned by this service.
///
/// `Ok(None)` means the source answered but has nothing for the ticker.
#[async_trait]
pub trait FundamentalsStore: Send + Sync {
    async fn stock_profile(&self, ticker: &str) -> Result<Option<StockProfile>, SourceError>;

    async fn sector_distributions(&self, sector: &str) -> Result<Vec<MetricDistribution>, SourceError>;

    async fn stock_metrics(&self, ticker: &str) -> Result<Option<MetricValues>, SourceError>;

    async fn latest_ic_score(&self, ticker: &str) -> Result<Option<IcScore>, SourceError>;

    async fn lifecycle_classification(
        &self,
        ticker: &str,
    ) -> Result<Option<LifecycleClassification>, SourceError>;

    async fn fair_value_metrics(&self, ticker: &str) -> Result<Option<FairValueMetrics>, SourceError>;

    /// Newest-first values of one statement field.
    async fn metric_history(
        &self,
        ticker: &str,
        mapping: MetricMapping,
        timeframe: Timeframe,
        limit: i64,
    ) -> Result<Vec<MetricDataPoint>, SourceError>;

    /// Companies in the same industry or sector, closest market cap first.
    async fn peers(
        &self,
        scope: PeerSource,
        classification: &str,
        market_cap: f64,
        exclude_ticker: &str,
        limit: i64,
    ) -> Result<Vec<EnrichedPeer>, SourceError>;
}

/// Third-party market data used to enrich the stored fundamentals.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quality_scores(&self, ticker: &str) -> Result<QualityScores, SourceError>;

    async fn ttm_graham_number(&self, ticker: &str) -> Result<Option<f64>, SourceError>;

    async fn price_target_consensus(&self, ticker: &str) -> Result<Option<f64>, SourceError>;
}
