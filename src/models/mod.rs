pub mod fundamentals;
pub mod health;
pub mod metric_history;
pub mod valuation;

pub use fundamentals::{
    display_name, is_lower_better, lifecycle_description, Breakpoints, EnrichedPeer, IcScore,
    LifecycleClassification, MetricDistribution, MetricPercentileData, MetricValues, PeerData,
    PeerMetrics, PeerSource, PeersReport, PercentileMap, QualityScores, SectorPercentilesReport,
    StockProfile, TRACKED_METRICS,
};
pub use health::{
    AltmanZone, DataQuality, HealthBadge, HealthComponent, HealthScore, HealthSummary, Insight,
    InsightSet, LifecycleInfo, RedFlag, Severity,
};
pub use metric_history::{
    is_known_field, metric_mapping, supported_metrics, MetricDataPoint, MetricHistoryReport, MetricMapping,
    MetricTrend, Timeframe, TrendDirection,
};
pub use valuation::{
    AnalystConsensus, Confidence, FairValueMetrics, FairValueModel, FairValueReport,
    MarginOfSafety, ValuationZone,
};
