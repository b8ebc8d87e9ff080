use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored fair-value estimates for a ticker, joined with the latest price.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct FairValueMetrics {
    pub ticker: String,
    pub dcf_fair_value: Option<f64>,
    pub epv_fair_value: Option<f64>,
    pub graham_number: Option<f64>,
    pub dcf_upside_percent: Option<f64>,
    pub wacc: Option<f64>,
    pub stock_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One valuation model's output, built per request from whichever sources responded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairValueModel {
    pub fair_value: Option<f64>,
    pub upside_percent: Option<f64>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, f64>,
}

impl FairValueModel {
    pub fn new(fair_value: Option<f64>, confidence: Confidence) -> Self {
        Self {
            fair_value,
            upside_percent: None,
            confidence,
            inputs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalystConsensus {
    pub target_price: f64,
    pub upside_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationZone {
    Undervalued,
    FairlyValued,
    Overvalued,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginOfSafety {
    pub avg_fair_value: f64,
    pub deviation_percent: f64,
    pub zone: ValuationZone,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FairValueReport {
    pub ticker: String,
    pub current_price: Option<f64>,
    pub models: BTreeMap<String, FairValueModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyst_consensus: Option<AnalystConsensus>,
    /// `None` means no verdict could be formed, not a zero deviation.
    pub margin_of_safety: Option<MarginOfSafety>,
    pub suppressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppression_reason: Option<String>,
}
