use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Quarterly,
    Annual,
}

impl Timeframe {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "quarterly" => Some(Timeframe::Quarterly),
            "annual" => Some(Timeframe::Annual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Quarterly => "quarterly",
            Timeframe::Annual => "annual",
        }
    }

    /// Periods back to the same point one year earlier.
    pub fn yoy_lookback(&self) -> usize {
        match self {
            Timeframe::Quarterly => 4,
            Timeframe::Annual => 1,
        }
    }
}

/// Where a user-facing metric lives in the stored financial statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricMapping {
    pub statement_type: &'static str,
    pub field_name: &'static str,
    pub unit: &'static str,
}

const METRIC_MAPPINGS: &[(&str, MetricMapping)] = &[
    ("revenue", MetricMapping { statement_type: "income", field_name: "revenues", unit: "USD" }),
    ("net_income", MetricMapping { statement_type: "income", field_name: "net_income_loss", unit: "USD" }),
    ("gross_profit", MetricMapping { statement_type: "income", field_name: "gross_profit", unit: "USD" }),
    ("operating_income", MetricMapping { statement_type: "income", field_name: "operating_income_loss", unit: "USD" }),
    ("eps", MetricMapping { statement_type: "income", field_name: "diluted_earnings_per_share", unit: "USD" }),
    ("gross_margin", MetricMapping { statement_type: "ratios", field_name: "gross_margin", unit: "percent" }),
    ("operating_margin", MetricMapping { statement_type: "ratios", field_name: "operating_margin", unit: "percent" }),
    ("net_margin", MetricMapping { statement_type: "ratios", field_name: "net_profit_margin", unit: "percent" }),
    ("roe", MetricMapping { statement_type: "ratios", field_name: "return_on_equity", unit: "percent" }),
    ("roa", MetricMapping { statement_type: "ratios", field_name: "return_on_assets", unit: "percent" }),
    ("debt_to_equity", MetricMapping { statement_type: "ratios", field_name: "debt_to_equity", unit: "ratio" }),
    ("current_ratio", MetricMapping { statement_type: "ratios", field_name: "current_ratio", unit: "ratio" }),
];

pub fn metric_mapping(metric: &str) -> Option<MetricMapping> {
    METRIC_MAPPINGS
        .iter()
        .find(|(name, _)| *name == metric)
        .map(|(_, mapping)| *mapping)
}

/// Sorted list of metric names with a statement mapping.
pub fn supported_metrics() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = METRIC_MAPPINGS.iter().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names
}

/// Only field names from the mapping table may reach the JSONB lookup.
pub fn is_known_field(field_name: &str) -> bool {
    METRIC_MAPPINGS.iter().any(|(_, m)| m.field_name == field_name)
}

/// One period of a metric time series (newest-first order in a series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MetricDataPoint {
    pub period_end: String,
    pub fiscal_year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_quarter: Option<i32>,
    pub value: Option<f64>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yoy_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    pub consecutive_growth_periods: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricHistoryReport {
    pub ticker: String,
    pub metric: String,
    pub timeframe: Timeframe,
    pub unit: &'static str,
    pub data_points: Vec<MetricDataPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<MetricTrend>,
}
