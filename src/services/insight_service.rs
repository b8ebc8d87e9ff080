use crate::models::{display_name, Insight, InsightSet, MetricValues, PercentileMap, QualityScores, RedFlag, Severity};
use crate::services::health_score_service::ALTMAN_DISTRESS_THRESHOLD;

/// Percentile at or above which a metric counts as a strength.
pub const STRENGTH_PERCENTILE: f64 = 75.0;
/// Percentile at or below which a metric counts as a concern.
pub const CONCERN_PERCENTILE: f64 = 25.0;
pub const DEFAULT_INSIGHT_LIMIT: usize = 3;

const WEAK_PIOTROSKI_MAX: i32 = 3;
const PAYOUT_RATIO_LIMIT: f64 = 100.0;
const HIGH_LEVERAGE_PERCENTILE: f64 = 10.0;
const LOW_INTEREST_COVERAGE: f64 = 2.0;

struct Candidate<'a> {
    metric: &'a str,
    percentile: f64,
}

/// Metrics whose percentile passes `keep`, ordered by `pct_order` with the
/// metric name as tie-breaker, truncated to `limit`.
fn ranked_candidates<'a>(
    percentiles: &'a PercentileMap,
    keep: impl Fn(f64) -> bool,
    descending: bool,
    limit: usize,
) -> Vec<Candidate<'a>> {
    let mut candidates: Vec<Candidate<'a>> = percentiles
        .iter()
        .filter(|(_, pct)| pct.is_finite() && keep(**pct))
        .map(|(metric, pct)| Candidate {
            metric: metric.as_str(),
            percentile: *pct,
        })
        .collect();

    candidates.sort_by(|a, b| {
        let by_pct = if descending {
            b.percentile.total_cmp(&a.percentile)
        } else {
            a.percentile.total_cmp(&b.percentile)
        };
        by_pct.then_with(|| a.metric.cmp(b.metric))
    });
    candidates.truncate(limit);
    candidates
}

/// Best-ranked metrics (percentile >= 75), best first.
pub fn generate_strengths(
    values: &MetricValues,
    percentiles: &PercentileMap,
    sector: &str,
    limit: usize,
) -> Vec<Insight> {
    ranked_candidates(percentiles, |p| p >= STRENGTH_PERCENTILE, true, limit)
        .into_iter()
        .map(|c| Insight {
            metric: c.metric.to_string(),
            value: values.get(c.metric),
            percentile: Some(c.percentile),
            message: format!(
                "{} ranks in top {:.0}% of {} sector",
                display_name(c.metric),
                100.0 - c.percentile,
                sector
            ),
        })
        .collect()
}

/// Worst-ranked metrics (percentile <= 25), worst first.
pub fn generate_concerns(
    values: &MetricValues,
    percentiles: &PercentileMap,
    sector: &str,
    limit: usize,
) -> Vec<Insight> {
    ranked_candidates(percentiles, |p| p <= CONCERN_PERCENTILE, false, limit)
        .into_iter()
        .map(|c| Insight {
            metric: c.metric.to_string(),
            value: values.get(c.metric),
            percentile: Some(c.percentile),
            message: format!(
                "{} is below {:.0}% of {} sector peers",
                display_name(c.metric),
                100.0 - c.percentile,
                sector
            ),
        })
        .collect()
}

/// Independent warning rules. Each emits at most one flag; the result is
/// empty, never absent, when nothing fires.
pub fn detect_red_flags(
    values: &MetricValues,
    scores: &QualityScores,
    percentiles: &PercentileMap,
) -> Vec<RedFlag> {
    let mut flags = Vec::new();

    if let Some(z) = scores.altman_z_score.filter(|z| *z < ALTMAN_DISTRESS_THRESHOLD) {
        flags.push(RedFlag {
            id: "altman_distress".to_string(),
            severity: Severity::High,
            title: "Altman Z-Score indicates financial distress".to_string(),
            description: format!(
                "Z-Score of {:.2} is below the {} distress threshold",
                z, ALTMAN_DISTRESS_THRESHOLD
            ),
            related_metrics: vec!["altman_z_score".to_string()],
        });
    }

    if let Some(f) = scores.piotroski_score.filter(|f| *f <= WEAK_PIOTROSKI_MAX) {
        flags.push(RedFlag {
            id: "weak_piotroski".to_string(),
            severity: Severity::Medium,
            title: "Weak Piotroski F-Score".to_string(),
            description: format!("F-Score of {}/9 suggests deteriorating fundamentals", f),
            related_metrics: vec!["piotroski_f_score".to_string()],
        });
    }

    if let Some(payout) = values.get("payout_ratio").filter(|p| *p > PAYOUT_RATIO_LIMIT) {
        flags.push(RedFlag {
            id: "unsustainable_dividend".to_string(),
            severity: Severity::High,
            title: "Unsustainable dividend payout".to_string(),
            description: format!(
                "Payout ratio of {:.1}% exceeds 100%, dividend may not be sustainable",
                payout
            ),
            related_metrics: vec!["payout_ratio".to_string(), "dividend_yield".to_string()],
        });
    }

    let leverage_pct = percentiles.get("debt_to_equity").copied();
    let coverage = values.get("interest_coverage");
    if let (Some(pct), Some(coverage)) = (leverage_pct, coverage) {
        if pct <= HIGH_LEVERAGE_PERCENTILE && coverage < LOW_INTEREST_COVERAGE {
            let description = match values.get("debt_to_equity") {
                Some(de) => format!(
                    "Debt/Equity of {:.2} with interest coverage of {:.1}x",
                    de, coverage
                ),
                None => format!(
                    "Debt/Equity in the bottom {:.0}% of the sector with interest coverage of {:.1}x",
                    HIGH_LEVERAGE_PERCENTILE, coverage
                ),
            };
            flags.push(RedFlag {
                id: "high_leverage".to_string(),
                severity: Severity::High,
                title: "High leverage with low interest coverage".to_string(),
                description,
                related_metrics: vec![
                    "debt_to_equity".to_string(),
                    "interest_coverage".to_string(),
                ],
            });
        }
    }

    flags
}

/// Strengths, concerns and red flags for one request's snapshot.
pub fn generate_insights(
    values: &MetricValues,
    percentiles: &PercentileMap,
    scores: &QualityScores,
    sector: &str,
    strengths_limit: usize,
    concerns_limit: usize,
) -> InsightSet {
    InsightSet {
        strengths: generate_strengths(values, percentiles, sector, strengths_limit),
        concerns: generate_concerns(values, percentiles, sector, concerns_limit),
        red_flags: detect_red_flags(values, scores, percentiles),
    }
}
