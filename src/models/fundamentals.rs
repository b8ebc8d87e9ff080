use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Static metric tables
// ---------------------------------------------------------------------------

/// Metrics with a sector distribution in the percentile materialized view.
pub const TRACKED_METRICS: &[&str] = &[
    // Valuation (lower is better)
    "pe_ratio", "ps_ratio", "pb_ratio", "ev_ebitda", "peg_ratio",
    // Profitability
    "roe", "roa", "roic", "gross_margin", "operating_margin", "net_margin",
    // Growth
    "revenue_growth_yoy", "earnings_growth_yoy", "eps_growth_yoy",
    // Financial health
    "current_ratio", "quick_ratio", "debt_to_equity", "interest_coverage",
    // Efficiency
    "asset_turnover", "inventory_turnover", "receivables_turnover",
    // Market
    "dividend_yield", "free_cash_flow_yield", "earnings_yield",
];

const LOWER_IS_BETTER: &[&str] = &[
    "pe_ratio",
    "ps_ratio",
    "pb_ratio",
    "ev_ebitda",
    "peg_ratio",
    "debt_to_equity",
    "net_debt_to_ebitda",
];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("gross_margin", "Gross margin"),
    ("operating_margin", "Operating margin"),
    ("net_margin", "Net margin"),
    ("ebitda_margin", "EBITDA margin"),
    ("roe", "Return on equity"),
    ("roa", "Return on assets"),
    ("roic", "Return on invested capital"),
    ("revenue_growth_yoy", "Revenue growth (YoY)"),
    ("eps_growth_yoy", "EPS growth (YoY)"),
    ("current_ratio", "Current ratio"),
    ("quick_ratio", "Quick ratio"),
    ("debt_to_equity", "Debt/Equity"),
    ("interest_coverage", "Interest coverage"),
    ("dividend_yield", "Dividend yield"),
    ("pe_ratio", "P/E ratio"),
    ("pb_ratio", "P/B ratio"),
    ("ps_ratio", "P/S ratio"),
    ("ev_to_ebitda", "EV/EBITDA"),
];

/// True when a smaller raw value is the favorable one (valuation multiples, leverage).
pub fn is_lower_better(metric_name: &str) -> bool {
    LOWER_IS_BETTER.contains(&metric_name)
}

/// Human-readable metric name; unknown keys fall back to the key itself.
pub fn display_name(metric_name: &str) -> &str {
    DISPLAY_NAMES
        .iter()
        .find(|(key, _)| *key == metric_name)
        .map(|(_, name)| *name)
        .unwrap_or(metric_name)
}

// ---------------------------------------------------------------------------
// Sector distributions
// ---------------------------------------------------------------------------

/// Precomputed distribution breakpoints for one (sector, metric).
/// Absent values are unset, never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakpoints {
    pub min: Option<f64>,
    pub p10: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub max: Option<f64>,
}

impl Breakpoints {
    /// Present breakpoints in documented order, paired with their percentile anchor.
    pub fn anchors(&self) -> Vec<(f64, f64)> {
        [
            (self.min, 0.0),
            (self.p10, 10.0),
            (self.p25, 25.0),
            (self.p50, 50.0),
            (self.p75, 75.0),
            (self.p90, 90.0),
            (self.max, 100.0),
        ]
        .into_iter()
        .filter_map(|(value, pct)| value.filter(|v| v.is_finite()).map(|v| (v, pct)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDistribution {
    pub sector: String,
    pub metric_name: String,
    pub breakpoints: Breakpoints,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub sample_count: Option<i32>,
    pub calculated_at: DateTime<Utc>,
    pub lower_is_better: bool,
}

impl MetricDistribution {
    pub fn new(
        sector: impl Into<String>,
        metric_name: impl Into<String>,
        breakpoints: Breakpoints,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        let metric_name = metric_name.into();
        let lower_is_better = is_lower_better(&metric_name);
        Self {
            sector: sector.into(),
            metric_name,
            breakpoints,
            mean: None,
            std_dev: None,
            sample_count: None,
            calculated_at,
            lower_is_better,
        }
    }

    pub fn with_sample_count(mut self, sample_count: i32) -> Self {
        self.sample_count = Some(sample_count);
        self
    }
}

// ---------------------------------------------------------------------------
// Per-entity metric snapshot
// ---------------------------------------------------------------------------

/// Metric name -> optional value for one company at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValues(BTreeMap<String, Option<f64>>);

impl MetricValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.0.insert(name.into(), value);
    }

    /// The value for `name`, if the metric exists and is populated.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<f64>)> for MetricValues {
    fn from_iter<I: IntoIterator<Item = (K, Option<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Direction-corrected percentiles keyed by metric name (higher = better).
pub type PercentileMap = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Reference data loaded alongside the metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockProfile {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
}

impl StockProfile {
    /// Sector classification, treating blank strings as missing.
    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IcScore {
    pub ticker: String,
    pub date: NaiveDate,
    pub overall_score: f64,
    pub financial_health_score: Option<f64>,
}

/// Third-party quality scores: Piotroski F-Score (0-9) and Altman Z-Score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub piotroski_score: Option<i32>,
    pub altman_z_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LifecycleClassification {
    pub ticker: String,
    pub lifecycle_stage: String,
    pub classified_at: DateTime<Utc>,
    pub revenue_growth_yoy: Option<f64>,
    pub net_margin: Option<f64>,
    pub pe_ratio: Option<f64>,
}

pub fn lifecycle_description(stage: &str) -> &'static str {
    match stage {
        "hypergrowth" => "Hypergrowth company with >50% revenue growth. Focus on growth trajectory over current profitability.",
        "growth" => "Growth company with 20-50% revenue growth. Balancing expansion with emerging profitability.",
        "mature" => "Mature company with stable operations. Focus on profitability, cash flow, and capital efficiency.",
        "value" => "Value opportunity with low valuation and solid margins. Focus on intrinsic value and dividend potential.",
        "turnaround" => "Turnaround situation with declining revenue. Focus on financial health and recovery signals.",
        _ => "Unknown lifecycle stage",
    }
}

// ---------------------------------------------------------------------------
// Sector percentile report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MetricPercentileData {
    pub value: Option<f64>,
    pub percentile: Option<f64>,
    pub lower_is_better: bool,
    pub sample_count: Option<i32>,
    pub distribution: Breakpoints,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorPercentilesReport {
    pub ticker: String,
    pub sector: String,
    pub calculated_at: Option<NaiveDate>,
    pub sample_count: Option<i32>,
    pub metrics: BTreeMap<String, MetricPercentileData>,
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrichedPeer {
    pub symbol: String,
    pub name: String,
    pub industry: String,
    pub market_cap: Option<f64>,
    pub ic_score: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub net_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PeerMetrics {
    pub pe_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub net_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub market_cap: Option<f64>,
}

impl PeerMetrics {
    pub fn from_values(values: &MetricValues, market_cap: Option<f64>) -> Self {
        Self {
            pe_ratio: values.get("pe_ratio"),
            roe: values.get("roe"),
            revenue_growth_yoy: values.get("revenue_growth_yoy"),
            net_margin: values.get("net_margin"),
            debt_to_equity: values.get("debt_to_equity"),
            market_cap,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerData {
    pub ticker: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ic_score: Option<f64>,
    pub industry: String,
    pub metrics: PeerMetrics,
}

impl From<EnrichedPeer> for PeerData {
    fn from(p: EnrichedPeer) -> Self {
        Self {
            metrics: PeerMetrics {
                pe_ratio: p.pe_ratio,
                roe: p.roe,
                revenue_growth_yoy: p.revenue_growth_yoy,
                net_margin: p.net_margin,
                debt_to_equity: p.debt_to_equity,
                market_cap: p.market_cap,
            },
            ticker: p.symbol,
            company_name: p.name,
            ic_score: p.ic_score,
            industry: p.industry,
        }
    }
}

/// Which classification the peer set was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSource {
    Industry,
    Sector,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeersReport {
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ic_score: Option<f64>,
    pub industry: Option<String>,
    pub peer_source: PeerSource,
    pub peers: Vec<PeerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_metrics: Option<PeerMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_peer_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_peers_delta: Option<f64>,
}
