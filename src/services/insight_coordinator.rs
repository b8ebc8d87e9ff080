use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::InsightConfig;
use crate::external::fundamentals_source::{FundamentalsStore, MarketDataProvider, SourceError};
use crate::models::*;
use crate::services::distribution_cache::DistributionCache;
use crate::services::fair_value_service::{build_fair_value_report, FairValueInputs};
use crate::services::health_score_service::{health_score, HealthInputs};
use crate::services::insight_service::generate_insights;
use crate::services::percentile_service::{percentile, percentile_map};
use crate::services::trend_service::{apply_yoy_changes, compute_trend};

/// Minimum industry peers before widening the search to the whole sector.
const MIN_INDUSTRY_PEERS: usize = 3;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("no data available for {0}")]
    StockNotFound(String),

    #[error("no sector classification available for {0}")]
    SectorUnavailable(String),

    #[error("no sector percentile data available for sector {sector} ({ticker})")]
    NoPercentileData { ticker: String, sector: String },

    #[error("metric '{metric}' is not supported")]
    UnknownMetric { metric: String, valid: Vec<&'static str> },

    #[error("timeframe must be 'quarterly' or 'annual', got '{0}'")]
    InvalidTimeframe(String),

    #[error("no {metric} history available for {ticker}")]
    NoHistory { ticker: String, metric: String },

    #[error("market cap data not available for {0}, cannot determine peers")]
    MissingMarketCap(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Keep a non-critical fan-out result, logging and dropping its error.
fn settle<T>(ticker: &str, source: &str, result: Result<T, SourceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} unavailable for {}: {}", source, ticker, e);
            None
        }
    }
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Gathers the independent upstream inputs for each insight request
/// concurrently, then runs the pure scoring stages on the joined snapshot.
pub struct InsightCoordinator {
    store: Arc<dyn FundamentalsStore>,
    market: Option<Arc<dyn MarketDataProvider>>,
    cache: DistributionCache,
    config: InsightConfig,
}

impl InsightCoordinator {
    pub fn new(
        store: Arc<dyn FundamentalsStore>,
        market: Option<Arc<dyn MarketDataProvider>>,
        config: InsightConfig,
    ) -> Self {
        let cache = DistributionCache::new(Duration::seconds(config.percentile_cache_ttl_secs));
        Self {
            store,
            market,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub fn has_market_data(&self) -> bool {
        self.market.is_some()
    }

    // -----------------------------------------------------------------------
    // Source helpers
    // -----------------------------------------------------------------------

    async fn load_distributions(&self, sector: &str) -> Result<Arc<Vec<MetricDistribution>>, SourceError> {
        if let Some(hit) = self.cache.get(sector) {
            debug!("Sector percentile cache hit for {}", sector);
            return Ok(hit);
        }
        let fetched = self.store.sector_distributions(sector).await?;
        Ok(self.cache.insert(sector, fetched))
    }

    async fn quality_scores(&self, ticker: &str) -> Result<Option<QualityScores>, SourceError> {
        match &self.market {
            Some(market) => market.quality_scores(ticker).await.map(Some),
            None => Ok(None),
        }
    }

    async fn ttm_graham_number(&self, ticker: &str) -> Result<Option<f64>, SourceError> {
        match &self.market {
            Some(market) => market.ttm_graham_number(ticker).await,
            None => Ok(None),
        }
    }

    async fn price_target(&self, ticker: &str) -> Result<Option<f64>, SourceError> {
        match &self.market {
            Some(market) => market.price_target_consensus(ticker).await,
            None => Ok(None),
        }
    }

    async fn require_profile(&self, ticker: &str) -> Result<StockProfile, InsightError> {
        self.store
            .stock_profile(ticker)
            .await?
            .ok_or_else(|| InsightError::StockNotFound(ticker.to_string()))
    }

    async fn require_sector(&self, ticker: &str) -> Result<String, InsightError> {
        let profile = self.require_profile(ticker).await?;
        profile
            .sector()
            .map(str::to_string)
            .ok_or_else(|| InsightError::SectorUnavailable(ticker.to_string()))
    }

    // -----------------------------------------------------------------------
    // Sector percentiles
    // -----------------------------------------------------------------------

    /// Where the stock sits in each of its sector's metric distributions.
    /// An empty `metric_filter` keeps every metric; names outside the tracked
    /// set are rejected.
    pub async fn sector_percentiles(
        &self,
        ticker: &str,
        metric_filter: &[String],
    ) -> Result<SectorPercentilesReport, InsightError> {
        if let Some(unknown) = metric_filter
            .iter()
            .find(|m| !TRACKED_METRICS.contains(&m.as_str()))
        {
            let mut valid = TRACKED_METRICS.to_vec();
            valid.sort_unstable();
            return Err(InsightError::UnknownMetric {
                metric: unknown.clone(),
                valid,
            });
        }

        let ticker = normalize_ticker(ticker);
        let sector = self.require_sector(&ticker).await?;

        let (distributions, metrics) = tokio::join!(
            self.load_distributions(&sector),
            self.store.stock_metrics(&ticker),
        );

        let distributions = distributions.map_err(|e| {
            warn!("Failed to fetch sector percentiles for {}: {}", sector, e);
            InsightError::Source(e)
        })?;
        if distributions.is_empty() {
            return Err(InsightError::NoPercentileData { ticker, sector });
        }
        let metrics = settle(&ticker, "Stock metrics", metrics).flatten();

        let mut report = SectorPercentilesReport {
            ticker: ticker.clone(),
            sector,
            calculated_at: distributions.first().map(|d| d.calculated_at.date_naive()),
            sample_count: None,
            metrics: BTreeMap::new(),
        };

        for dist in distributions.iter() {
            if !metric_filter.is_empty() && !metric_filter.iter().any(|m| *m == dist.metric_name) {
                continue;
            }
            if report.sample_count.is_none() {
                report.sample_count = dist.sample_count;
            }

            let value = metrics.as_ref().and_then(|m| m.get(&dist.metric_name));
            report.metrics.insert(
                dist.metric_name.clone(),
                MetricPercentileData {
                    value,
                    percentile: value.and_then(|v| percentile(dist, v)),
                    lower_is_better: dist.lower_is_better,
                    sample_count: dist.sample_count,
                    distribution: dist.breakpoints,
                },
            );
        }

        info!("Computed {} sector percentiles for {}", report.metrics.len(), ticker);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Fair value
    // -----------------------------------------------------------------------

    pub async fn fair_value(&self, ticker: &str) -> Result<FairValueReport, InsightError> {
        let ticker = normalize_ticker(ticker);

        let (stored, graham, target) = tokio::join!(
            self.store.fair_value_metrics(&ticker),
            self.ttm_graham_number(&ticker),
            self.price_target(&ticker),
        );

        let inputs = FairValueInputs {
            stored: settle(&ticker, "Fair value metrics", stored).flatten(),
            ttm_graham_number: settle(&ticker, "TTM ratios", graham).flatten(),
            analyst_target: settle(&ticker, "Price target consensus", target).flatten(),
        };

        let report = build_fair_value_report(&ticker, &inputs);
        if report.suppressed {
            info!("Fair value suppressed for {}: no model inputs", ticker);
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Health summary
    // -----------------------------------------------------------------------

    /// Badge, components, lifecycle, strengths, concerns and red flags.
    ///
    /// Only the sector classification is required; every other source may fail
    /// and simply lowers `sources_available`.
    pub async fn health_summary(&self, ticker: &str) -> Result<HealthSummary, InsightError> {
        let ticker = normalize_ticker(ticker);
        let sector = self.require_sector(&ticker).await?;

        let (ic_score, scores, lifecycle, metrics, distributions) = tokio::join!(
            self.store.latest_ic_score(&ticker),
            self.quality_scores(&ticker),
            self.store.lifecycle_classification(&ticker),
            self.store.stock_metrics(&ticker),
            self.load_distributions(&sector),
        );

        let ic_score = settle(&ticker, "IC Score", ic_score).flatten();
        let scores = settle(&ticker, "Quality scores", scores).flatten();
        let lifecycle = settle(&ticker, "Lifecycle classification", lifecycle).flatten();
        let metrics = settle(&ticker, "Stock metrics", metrics).flatten();
        let distributions = settle(&ticker, "Sector percentiles", distributions).filter(|d| !d.is_empty());

        let sources_available = [
            ic_score.is_some(),
            scores.is_some(),
            lifecycle.is_some(),
            metrics.is_some(),
            distributions.is_some(),
        ]
        .into_iter()
        .filter(|available| *available)
        .count();
        let data_quality = DataQuality::from_sources(sources_available);

        let metrics = metrics.unwrap_or_default();
        let percentiles = distributions
            .as_deref()
            .map(|d| percentile_map(d, &metrics))
            .unwrap_or_default();
        let scores = scores.unwrap_or_default();

        let health = health_score(&HealthInputs {
            piotroski_score: scores.piotroski_score,
            altman_z_score: scores.altman_z_score,
            financial_health_score: ic_score.as_ref().and_then(|ic| ic.financial_health_score),
            debt_percentile: percentiles.get("debt_to_equity").copied(),
        });

        let insights = generate_insights(
            &metrics,
            &percentiles,
            &scores,
            &sector,
            self.config.strengths_limit,
            self.config.concerns_limit,
        );

        let lifecycle = lifecycle.map(|lc| LifecycleInfo {
            description: lifecycle_description(&lc.lifecycle_stage).to_string(),
            classified_at: lc.classified_at.format("%Y-%m-%d").to_string(),
            stage: lc.lifecycle_stage,
        });

        info!(
            "Health summary for {}: {} ({:.1}), {} of 5 sources",
            ticker,
            health.badge.label(),
            health.score,
            sources_available
        );

        Ok(HealthSummary {
            ticker,
            sector,
            health,
            lifecycle,
            strengths: insights.strengths,
            concerns: insights.concerns,
            red_flags: insights.red_flags,
            data_quality,
            sources_available,
        })
    }

    // -----------------------------------------------------------------------
    // Metric history
    // -----------------------------------------------------------------------

    pub async fn metric_history(
        &self,
        ticker: &str,
        metric: &str,
        timeframe: Option<&str>,
        limit: Option<i64>,
    ) -> Result<MetricHistoryReport, InsightError> {
        let ticker = normalize_ticker(ticker);
        let metric = metric.trim().to_lowercase();

        let mapping = metric_mapping(&metric).ok_or_else(|| InsightError::UnknownMetric {
            metric: metric.clone(),
            valid: supported_metrics(),
        })?;

        let timeframe_raw = timeframe.unwrap_or("quarterly");
        let timeframe = Timeframe::parse(timeframe_raw)
            .ok_or_else(|| InsightError::InvalidTimeframe(timeframe_raw.to_string()))?;

        let limit = InsightConfig::clamp_limit(
            limit,
            self.config.history_default_limit,
            self.config.history_max_limit,
        );

        let mut data_points = self
            .store
            .metric_history(&ticker, mapping, timeframe, limit)
            .await?;
        if data_points.is_empty() {
            return Err(InsightError::NoHistory { ticker, metric });
        }

        apply_yoy_changes(&mut data_points, timeframe);
        let trend = compute_trend(&data_points);

        Ok(MetricHistoryReport {
            ticker,
            metric,
            timeframe,
            unit: mapping.unit,
            data_points,
            trend,
        })
    }

    // -----------------------------------------------------------------------
    // Peers
    // -----------------------------------------------------------------------

    pub async fn peers(&self, ticker: &str, limit: Option<i64>) -> Result<PeersReport, InsightError> {
        let ticker = normalize_ticker(ticker);
        let limit = InsightConfig::clamp_limit(
            limit,
            self.config.peers_default_limit,
            self.config.peers_max_limit,
        );

        let profile = self.require_profile(&ticker).await?;
        let market_cap = profile
            .market_cap
            .filter(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| InsightError::MissingMarketCap(ticker.clone()))?;

        let mut peer_source = PeerSource::Industry;
        let mut peers = Vec::new();

        if let Some(industry) = profile.industry() {
            let found = self
                .store
                .peers(PeerSource::Industry, industry, market_cap, &ticker, limit)
                .await;
            peers = settle(&ticker, "Industry peers", found).unwrap_or_default();
        }

        if peers.len() < MIN_INDUSTRY_PEERS {
            if let Some(sector) = profile.sector() {
                peer_source = PeerSource::Sector;
                peers = self
                    .store
                    .peers(PeerSource::Sector, sector, market_cap, &ticker, limit)
                    .await?;
            }
        }

        let (ic_score, metrics) = tokio::join!(
            self.store.latest_ic_score(&ticker),
            self.store.stock_metrics(&ticker),
        );
        let ic_score = settle(&ticker, "IC Score", ic_score)
            .flatten()
            .map(|ic| ic.overall_score);
        let stock_metrics = settle(&ticker, "Stock metrics", metrics)
            .flatten()
            .map(|m| PeerMetrics::from_values(&m, Some(market_cap)));

        let peers: Vec<PeerData> = peers.into_iter().map(PeerData::from).collect();
        let peer_scores: Vec<f64> = peers.iter().filter_map(|p| p.ic_score).collect();
        let avg_peer_score = (!peer_scores.is_empty())
            .then(|| peer_scores.iter().sum::<f64>() / peer_scores.len() as f64);
        let vs_peers_delta = match (ic_score, avg_peer_score) {
            (Some(own), Some(avg)) => Some(own - avg),
            _ => None,
        };

        Ok(PeersReport {
            ticker,
            ic_score,
            industry: profile.industry().map(str::to_string),
            peer_source,
            peers,
            stock_metrics,
            avg_peer_score,
            vs_peers_delta,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store; sources named in `failing` return an error.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub profile: Option<StockProfile>,
        pub distributions: Vec<MetricDistribution>,
        pub metrics: Option<MetricValues>,
        pub ic_score: Option<IcScore>,
        pub lifecycle: Option<LifecycleClassification>,
        pub fair_value: Option<FairValueMetrics>,
        pub history: Vec<MetricDataPoint>,
        pub industry_peers: Vec<EnrichedPeer>,
        pub sector_peers: Vec<EnrichedPeer>,
        pub failing: HashSet<&'static str>,
        pub distribution_calls: AtomicUsize,
    }

    impl FakeStore {
        fn check(&self, source: &'static str) -> Result<(), SourceError> {
            if self.failing.contains(source) {
                return Err(SourceError::BadResponse(format!("{} down", source)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl FundamentalsStore for FakeStore {
        async fn stock_profile(&self, _ticker: &str) -> Result<Option<StockProfile>, SourceError> {
            self.check("profile")?;
            Ok(self.profile.clone())
        }

        async fn sector_distributions(&self, _sector: &str) -> Result<Vec<MetricDistribution>, SourceError> {
            self.distribution_calls.fetch_add(1, Ordering::SeqCst);
            self.check("distributions")?;
            Ok(self.distributions.clone())
        }

        async fn stock_metrics(&self, _ticker: &str) -> Result<Option<MetricValues>, SourceError> {
            self.check("metrics")?;
            Ok(self.metrics.clone())
        }

        async fn latest_ic_score(&self, _ticker: &str) -> Result<Option<IcScore>, SourceError> {
            self.check("ic_score")?;
            Ok(self.ic_score.clone())
        }

        async fn lifecycle_classification(&self, _ticker: &str) -> Result<Option<LifecycleClassification>, SourceError> {
            self.check("lifecycle")?;
            Ok(self.lifecycle.clone())
        }

        async fn fair_value_metrics(&self, _ticker: &str) -> Result<Option<FairValueMetrics>, SourceError> {
            self.check("fair_value")?;
            Ok(self.fair_value.clone())
        }

        async fn metric_history(
            &self,
            _ticker: &str,
            _mapping: MetricMapping,
            _timeframe: Timeframe,
            limit: i64,
        ) -> Result<Vec<MetricDataPoint>, SourceError> {
            self.check("history")?;
            Ok(self.history.iter().take(limit as usize).cloned().collect())
        }

        async fn peers(
            &self,
            scope: PeerSource,
            _classification: &str,
            _market_cap: f64,
            _exclude_ticker: &str,
            _limit: i64,
        ) -> Result<Vec<EnrichedPeer>, SourceError> {
            match scope {
                PeerSource::Industry => {
                    self.check("industry_peers")?;
                    Ok(self.industry_peers.clone())
                }
                PeerSource::Sector => {
                    self.check("sector_peers")?;
                    Ok(self.sector_peers.clone())
                }
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeMarket {
        pub scores: Option<QualityScores>,
        pub graham: Option<f64>,
        pub target: Option<f64>,
        pub failing: bool,
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn quality_scores(&self, _ticker: &str) -> Result<QualityScores, SourceError> {
            if self.failing {
                return Err(SourceError::RateLimited);
            }
            self.scores
                .ok_or_else(|| SourceError::BadResponse("no score data".into()))
        }

        async fn ttm_graham_number(&self, _ticker: &str) -> Result<Option<f64>, SourceError> {
            if self.failing {
                return Err(SourceError::RateLimited);
            }
            Ok(self.graham)
        }

        async fn price_target_consensus(&self, _ticker: &str) -> Result<Option<f64>, SourceError> {
            if self.failing {
                return Err(SourceError::RateLimited);
            }
            Ok(self.target)
        }
    }

    pub(crate) fn profile(sector: Option<&str>) -> StockProfile {
        StockProfile {
            symbol: "ACME".into(),
            name: "Acme Corp".into(),
            sector: sector.map(str::to_string),
            industry: Some("Widgets".into()),
            market_cap: Some(50_000_000_000.0),
        }
    }

    pub(crate) fn breakpoints() -> Breakpoints {
        Breakpoints {
            min: Some(0.0),
            p10: Some(5.0),
            p25: Some(10.0),
            p50: Some(20.0),
            p75: Some(35.0),
            p90: Some(50.0),
            max: Some(100.0),
        }
    }

    pub(crate) fn populated_store() -> FakeStore {
        let now = Utc::now();
        FakeStore {
            profile: Some(profile(Some("Technology"))),
            distributions: vec![
                MetricDistribution::new("Technology", "roe", breakpoints(), now).with_sample_count(120),
                MetricDistribution::new("Technology", "debt_to_equity", breakpoints(), now).with_sample_count(120),
                MetricDistribution::new("Technology", "net_margin", breakpoints(), now).with_sample_count(118),
            ],
            metrics: Some(
                [
                    ("roe", Some(60.0)),
                    ("debt_to_equity", Some(75.0)),
                    ("net_margin", None),
                    ("interest_coverage", Some(1.5)),
                    ("payout_ratio", Some(40.0)),
                ]
                .into_iter()
                .collect(),
            ),
            ic_score: Some(IcScore {
                ticker: "ACME".into(),
                date: NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
                overall_score: 72.0,
                financial_health_score: Some(80.0),
            }),
            lifecycle: Some(LifecycleClassification {
                ticker: "ACME".into(),
                lifecycle_stage: "mature".into(),
                classified_at: now,
                revenue_growth_yoy: Some(0.08),
                net_margin: Some(0.21),
                pe_ratio: Some(24.0),
            }),
            ..Default::default()
        }
    }

    fn coordinator(store: FakeStore, market: Option<FakeMarket>) -> InsightCoordinator {
        InsightCoordinator::new(
            Arc::new(store),
            market.map(|m| Arc::new(m) as Arc<dyn MarketDataProvider>),
            InsightConfig::default(),
        )
    }

    fn healthy_market() -> FakeMarket {
        FakeMarket {
            scores: Some(QualityScores {
                piotroski_score: Some(8),
                altman_z_score: Some(3.4),
            }),
            graham: Some(95.0),
            target: Some(130.0),
            failing: false,
        }
    }

    #[tokio::test]
    async fn test_health_summary_with_all_sources() {
        let c = coordinator(populated_store(), Some(healthy_market()));
        let summary = c.health_summary("acme").await.unwrap();

        assert_eq!(summary.ticker, "ACME");
        assert_eq!(summary.sources_available, 5);
        assert_eq!(summary.data_quality, DataQuality::Full);
        // roe 60 sits between p90 (50) and max (100): 90 + 10/50*10 = 92
        assert_eq!(summary.strengths.len(), 1);
        assert_eq!(summary.strengths[0].metric, "roe");
        assert_eq!(summary.strengths[0].percentile, Some(92.0));
        // debt_to_equity 75 -> raw 95, inverted 5
        assert_eq!(summary.concerns[0].metric, "debt_to_equity");
        assert_eq!(summary.concerns[0].percentile, Some(5.0));
        // leverage percentile 5 <= 10 and coverage 1.5 < 2
        assert!(summary.red_flags.iter().any(|f| f.id == "high_leverage"));
        assert_eq!(summary.lifecycle.as_ref().unwrap().stage, "mature");
        assert!(summary.health.components.contains_key("debt_percentile"));
        // 8/9*30 + 30 + 20 + 0.75
        assert_eq!(summary.health.score, 77.4);
        assert_eq!(summary.health.badge, HealthBadge::Healthy);
    }

    #[tokio::test]
    async fn test_health_summary_degrades_on_partial_failure() {
        let mut store = populated_store();
        store.failing = ["ic_score", "lifecycle", "metrics"].into_iter().collect();
        let c = coordinator(store, Some(FakeMarket { failing: true, ..Default::default() }));

        let summary = c.health_summary("ACME").await.unwrap();
        assert_eq!(summary.sources_available, 1);
        assert_eq!(summary.data_quality, DataQuality::Partial);
        assert!(summary.strengths.is_empty());
        assert!(summary.red_flags.is_empty());
        assert_eq!(summary.health.score, 0.0);
        assert_eq!(summary.health.badge, HealthBadge::Distressed);
    }

    #[tokio::test]
    async fn test_health_summary_without_any_source_is_insufficient() {
        let mut store = populated_store();
        store.failing = ["ic_score", "lifecycle", "metrics", "distributions"].into_iter().collect();
        let c = coordinator(store, None);

        let summary = c.health_summary("ACME").await.unwrap();
        assert_eq!(summary.sources_available, 0);
        assert_eq!(summary.data_quality, DataQuality::Insufficient);
    }

    #[tokio::test]
    async fn test_lone_max_distribution_raises_no_leverage_flag() {
        let mut store = populated_store();
        let only_max = Breakpoints {
            max: Some(100.0),
            ..Default::default()
        };
        store.distributions = vec![MetricDistribution::new("Technology", "debt_to_equity", only_max, Utc::now())];
        store.metrics = Some(
            [("debt_to_equity", Some(0.05)), ("interest_coverage", Some(1.5))]
                .into_iter()
                .collect(),
        );
        let c = coordinator(store, None);

        let summary = c.health_summary("ACME").await.unwrap();
        assert!(summary.red_flags.iter().all(|f| f.id != "high_leverage"));
        assert!(summary.concerns.is_empty());
        assert!(!summary.health.components.contains_key("debt_percentile"));
    }

    #[tokio::test]
    async fn test_missing_sector_aborts_request() {
        let mut store = populated_store();
        store.profile = Some(profile(None));
        let c = coordinator(store, None);

        let err = c.health_summary("ACME").await.unwrap_err();
        assert!(matches!(err, InsightError::SectorUnavailable(_)));
        let err = c.sector_percentiles("ACME", &[]).await.unwrap_err();
        assert!(matches!(err, InsightError::SectorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unknown_stock() {
        let c = coordinator(FakeStore::default(), None);
        let err = c.health_summary("NOPE").await.unwrap_err();
        assert!(matches!(err, InsightError::StockNotFound(t) if t == "NOPE"));
    }

    #[tokio::test]
    async fn test_sector_percentiles_report_and_filter() {
        let c = coordinator(populated_store(), None);

        let report = c.sector_percentiles("ACME", &[]).await.unwrap();
        assert_eq!(report.sector, "Technology");
        assert_eq!(report.metrics.len(), 3);
        assert_eq!(report.sample_count, Some(120));
        assert_eq!(report.metrics["roe"].percentile, Some(92.0));
        assert!(report.metrics["debt_to_equity"].lower_is_better);
        assert_eq!(report.metrics["net_margin"].value, None);
        assert_eq!(report.metrics["net_margin"].percentile, None);

        let filtered = c.sector_percentiles("ACME", &["roe".to_string()]).await.unwrap();
        assert_eq!(filtered.metrics.len(), 1);
    }

    #[tokio::test]
    async fn test_sector_percentiles_rejects_untracked_filter() {
        let c = coordinator(populated_store(), None);
        let filter = vec!["roe".to_string(), "vibes".to_string()];

        match c.sector_percentiles("ACME", &filter).await.unwrap_err() {
            InsightError::UnknownMetric { metric, valid } => {
                assert_eq!(metric, "vibes");
                assert!(valid.contains(&"debt_to_equity"));
                assert!(valid.windows(2).all(|w| w[0] <= w[1]));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sector_percentiles_tolerates_metric_failure() {
        let mut store = populated_store();
        store.failing = ["metrics"].into_iter().collect();
        let c = coordinator(store, None);

        let report = c.sector_percentiles("ACME", &[]).await.unwrap();
        assert!(report.metrics.values().all(|m| m.percentile.is_none()));
    }

    #[tokio::test]
    async fn test_sector_percentiles_requires_distributions() {
        let mut store = populated_store();
        store.distributions.clear();
        let c = coordinator(store, None);
        let err = c.sector_percentiles("ACME", &[]).await.unwrap_err();
        assert!(matches!(err, InsightError::NoPercentileData { .. }));

        let mut store = populated_store();
        store.failing = ["distributions"].into_iter().collect();
        let c = coordinator(store, None);
        let err = c.sector_percentiles("ACME", &[]).await.unwrap_err();
        assert!(matches!(err, InsightError::Source(_)));
    }

    #[tokio::test]
    async fn test_distributions_are_cached_per_sector() {
        let store = Arc::new(populated_store());
        let c = InsightCoordinator::new(store.clone(), None, InsightConfig::default());

        c.sector_percentiles("ACME", &[]).await.unwrap();
        c.health_summary("ACME").await.unwrap();
        assert_eq!(store.distribution_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fair_value_combines_sources() {
        let mut store = populated_store();
        store.fair_value = Some(FairValueMetrics {
            ticker: "ACME".into(),
            dcf_fair_value: Some(140.0),
            epv_fair_value: None,
            graham_number: None,
            dcf_upside_percent: None,
            wacc: None,
            stock_price: Some(100.0),
        });
        let c = coordinator(store, Some(healthy_market()));

        let report = c.fair_value("ACME").await.unwrap();
        assert_eq!(report.models.len(), 2);
        assert_eq!(report.models["graham_number"].fair_value, Some(95.0));
        let mos = report.margin_of_safety.unwrap();
        assert!((mos.avg_fair_value - 117.5).abs() < 1e-9);
        assert_eq!(mos.zone, ValuationZone::Undervalued);
        assert_eq!(report.analyst_consensus.unwrap().target_price, 130.0);
    }

    #[tokio::test]
    async fn test_fair_value_with_every_source_failing_is_suppressed() {
        let mut store = populated_store();
        store.failing = ["fair_value"].into_iter().collect();
        let c = coordinator(store, Some(FakeMarket { failing: true, ..Default::default() }));

        let report = c.fair_value("ACME").await.unwrap();
        assert!(report.suppressed);
        assert!(report.margin_of_safety.is_none());
        assert!(report.analyst_consensus.is_none());
    }

    fn history_points(values: &[f64]) -> Vec<MetricDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricDataPoint {
                period_end: format!("2026-Q{}", i),
                fiscal_year: 2026,
                fiscal_quarter: None,
                value: Some(*v),
                yoy_change: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_metric_history_with_trend() {
        let mut store = populated_store();
        store.history = history_points(&[130.0, 125.0, 120.0, 110.0, 100.0]);
        let c = coordinator(store, None);

        let report = c.metric_history("ACME", "Revenue", None, None).await.unwrap();
        assert_eq!(report.metric, "revenue");
        assert_eq!(report.timeframe, Timeframe::Quarterly);
        assert_eq!(report.unit, "USD");
        assert!((report.data_points[0].yoy_change.unwrap() - 0.3).abs() < 1e-12);
        let trend = report.trend.unwrap();
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.consecutive_growth_periods, 4);
    }

    #[tokio::test]
    async fn test_metric_history_validation() {
        let c = coordinator(populated_store(), None);

        let err = c.metric_history("ACME", "ebitda", None, None).await.unwrap_err();
        match err {
            InsightError::UnknownMetric { valid, .. } => assert!(valid.contains(&"revenue")),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = c.metric_history("ACME", "revenue", Some("monthly"), None).await.unwrap_err();
        assert!(matches!(err, InsightError::InvalidTimeframe(_)));

        let err = c.metric_history("ACME", "revenue", Some("annual"), None).await.unwrap_err();
        assert!(matches!(err, InsightError::NoHistory { .. }));
    }

    fn peer(symbol: &str, ic_score: Option<f64>) -> EnrichedPeer {
        EnrichedPeer {
            symbol: symbol.into(),
            name: format!("{} Inc", symbol),
            industry: "Widgets".into(),
            market_cap: Some(40_000_000_000.0),
            ic_score,
            pe_ratio: None,
            roe: None,
            revenue_growth_yoy: None,
            net_margin: None,
            debt_to_equity: None,
        }
    }

    #[tokio::test]
    async fn test_peers_fall_back_to_sector() {
        let mut store = populated_store();
        store.industry_peers = vec![peer("AAA", Some(60.0))];
        store.sector_peers = vec![peer("BBB", Some(60.0)), peer("CCC", Some(70.0)), peer("DDD", None)];
        let c = coordinator(store, None);

        let report = c.peers("ACME", None).await.unwrap();
        assert_eq!(report.peer_source, PeerSource::Sector);
        assert_eq!(report.peers.len(), 3);
        assert_eq!(report.avg_peer_score, Some(65.0));
        assert_eq!(report.vs_peers_delta, Some(7.0));
        assert_eq!(report.ic_score, Some(72.0));
    }

    #[tokio::test]
    async fn test_peers_require_market_cap() {
        let mut store = populated_store();
        if let Some(p) = store.profile.as_mut() {
            p.market_cap = None;
        }
        let c = coordinator(store, None);
        let err = c.peers("ACME", None).await.unwrap_err();
        assert!(matches!(err, InsightError::MissingMarketCap(_)));
    }
}
