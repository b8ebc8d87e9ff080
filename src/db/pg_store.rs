use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::fundamentals_queries as queries;
use crate::external::fundamentals_source::{FundamentalsStore, SourceError};
use crate::models::{
    EnrichedPeer, FairValueMetrics, IcScore, LifecycleClassification, MetricDataPoint,
    MetricDistribution, MetricMapping, MetricValues, PeerSource, StockProfile, Timeframe,
};

/// Postgres-backed fundamentals store.
#[derive(Clone)]
pub struct PgFundamentalsStore {
    pool: PgPool,
}

impl PgFundamentalsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FundamentalsStore for PgFundamentalsStore {
    async fn stock_profile(&self, ticker: &str) -> Result<Option<StockProfile>, SourceError> {
        Ok(queries::fetch_stock_profile(&self.pool, ticker).await?)
    }

    async fn sector_distributions(&self, sector: &str) -> Result<Vec<MetricDistribution>, SourceError> {
        let rows = queries::fetch_sector_percentiles(&self.pool, sector).await?;
        Ok(rows.into_iter().map(MetricDistribution::from).collect())
    }

    async fn stock_metrics(&self, ticker: &str) -> Result<Option<MetricValues>, SourceError> {
        let row = queries::fetch_stock_metrics(&self.pool, ticker).await?;
        Ok(row.map(MetricValues::from))
    }

    async fn latest_ic_score(&self, ticker: &str) -> Result<Option<IcScore>, SourceError> {
        Ok(queries::fetch_latest_ic_score(&self.pool, ticker).await?)
    }

    async fn lifecycle_classification(
        &self,
        ticker: &str,
    ) -> Result<Option<LifecycleClassification>, SourceError> {
        Ok(queries::fetch_lifecycle_classification(&self.pool, ticker).await?)
    }

    async fn fair_value_metrics(&self, ticker: &str) -> Result<Option<FairValueMetrics>, SourceError> {
        Ok(queries::fetch_fair_value_metrics(&self.pool, ticker).await?)
    }

    async fn metric_history(
        &self,
        ticker: &str,
        mapping: MetricMapping,
        timeframe: Timeframe,
        limit: i64,
    ) -> Result<Vec<MetricDataPoint>, SourceError> {
        Ok(queries::fetch_metric_history(&self.pool, ticker, mapping, timeframe, limit).await?)
    }

    async fn peers(
        &self,
        scope: PeerSource,
        classification: &str,
        market_cap: f64,
        exclude_ticker: &str,
        limit: i64,
    ) -> Result<Vec<EnrichedPeer>, SourceError> {
        Ok(queries::fetch_peers(&self.pool, scope, classification, market_cap, exclude_ticker, limit).await?)
    }
}
