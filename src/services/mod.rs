pub mod distribution_cache;
pub mod fair_value_service;
pub mod health_score_service;
pub mod insight_coordinator;
pub mod insight_service;
pub mod percentile_service;
pub mod trend_service;
