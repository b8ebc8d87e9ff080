use std::collections::BTreeMap;

use crate::models::{MetricDistribution, MetricValues, PercentileMap};

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn interpolate(value: f64, lo_val: f64, hi_val: f64, lo_pct: f64, hi_pct: f64) -> f64 {
    if hi_val == lo_val {
        return lo_pct;
    }
    let ratio = (value - lo_val) / (hi_val - lo_val);
    lo_pct + ratio * (hi_pct - lo_pct)
}

/// Position of `value` within the distribution before any direction correction,
/// in [0, 100] and rounded to one decimal.
///
/// Only breakpoints that are present take part in bracketing. Out-of-order
/// breakpoints are walked in documented order and the first bracket whose upper
/// end reaches the value wins, the same as for well-formed data.
/// Returns `None` for non-finite input, when no breakpoint is populated, or
/// when the only breakpoint bounding the value is a lone `max` above it or a
/// lone `min` below it.
pub fn raw_percentile(dist: &MetricDistribution, value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let b = &dist.breakpoints;
    if matches!(b.min, Some(min) if value <= min) {
        return Some(0.0);
    }
    if matches!(b.max, Some(max) if value >= max) {
        return Some(100.0);
    }

    let anchors = b.anchors();
    let (first_val, first_pct) = *anchors.first()?;
    if value <= first_val {
        // Below a lone max there is nothing to compare against.
        return (first_pct < 100.0).then_some(first_pct);
    }

    let pct = match anchors.windows(2).find(|pair| value <= pair[1].0) {
        Some(pair) => interpolate(value, pair[0].0, pair[1].0, pair[0].1, pair[1].1),
        None => {
            let (_, last_pct) = anchors[anchors.len() - 1];
            // Likewise above a lone min.
            if last_pct <= 0.0 {
                return None;
            }
            last_pct
        }
    };

    if !pct.is_finite() {
        return None;
    }
    Some(round1(pct.clamp(0.0, 100.0)))
}

/// Sector-relative percentile where higher always means better.
///
/// For lower-is-better metrics the interpolated result is inverted afterwards.
pub fn percentile(dist: &MetricDistribution, value: f64) -> Option<f64> {
    let raw = raw_percentile(dist, value)?;
    if dist.lower_is_better {
        Some(round1(100.0 - raw))
    } else {
        Some(raw)
    }
}

/// Percentiles for every populated metric that has a sector distribution.
/// Metrics with a null value or no distribution are left out.
pub fn percentile_map(distributions: &[MetricDistribution], values: &MetricValues) -> PercentileMap {
    let by_name: BTreeMap<&str, &MetricDistribution> = distributions
        .iter()
        .map(|d| (d.metric_name.as_str(), d))
        .collect();

    values
        .iter()
        .filter_map(|(name, value)| {
            let value = value?;
            let dist = by_name.get(name)?;
            percentile(dist, value).map(|pct| (name.to_string(), pct))
        })
        .collect()
}
