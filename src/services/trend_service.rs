use crate::models::{MetricDataPoint, MetricTrend, Timeframe, TrendDirection};

/// Magnitudes below this are treated as zero when used as a divisor.
const EPSILON: f64 = 1e-10;

/// Direction, growth streak and normalized slope of a newest-first series.
///
/// Returns `None` for fewer than two points.
pub fn compute_trend(points: &[MetricDataPoint]) -> Option<MetricTrend> {
    if points.len() < 2 {
        return None;
    }

    let direction = match (points[0].value, points[1].value) {
        (Some(latest), Some(previous)) if latest > previous => TrendDirection::Up,
        (Some(latest), Some(previous)) if latest < previous => TrendDirection::Down,
        _ => TrendDirection::Flat,
    };

    // Unbroken run of growth starting at the most recent period.
    let consecutive_growth_periods = points
        .windows(2)
        .take_while(|pair| matches!((pair[0].value, pair[1].value), (Some(newer), Some(older)) if newer > older))
        .count();

    let slope = match (points[0].value, points[points.len() - 1].value) {
        (Some(newest), Some(oldest)) if oldest.abs() > EPSILON => {
            let s = (newest - oldest) / (points.len() - 1) as f64 / oldest.abs();
            s.is_finite().then_some(s)
        }
        _ => None,
    };

    Some(MetricTrend {
        direction,
        slope,
        consecutive_growth_periods,
    })
}

/// Fill `yoy_change` on each point from the value `timeframe.yoy_lookback()`
/// periods further back. Points without such a predecessor are left empty.
pub fn apply_yoy_changes(points: &mut [MetricDataPoint], timeframe: Timeframe) {
    let lookback = timeframe.yoy_lookback();
    let values: Vec<Option<f64>> = points.iter().map(|p| p.value).collect();

    for (i, point) in points.iter_mut().enumerate() {
        point.yoy_change = match (values[i], values.get(i + lookback).copied().flatten()) {
            (Some(current), Some(prior)) if prior.abs() > EPSILON => {
                let change = (current - prior) / prior.abs();
                change.is_finite().then_some(change)
            }
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[Option<f64>]) -> Vec<MetricDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricDataPoint {
                period_end: format!("2024-{:02}-28", 12 - i.min(11)),
                fiscal_year: 2024 - (i / 4) as i32,
                fiscal_quarter: Some(4 - (i % 4) as i32),
                value: *v,
                yoy_change: None,
            })
            .collect()
    }

    fn vals(values: &[f64]) -> Vec<MetricDataPoint> {
        series(&values.iter().map(|v| Some(*v)).collect::<Vec<_>>())
    }

    #[test]
    fn test_needs_two_points() {
        assert!(compute_trend(&[]).is_none());
        assert!(compute_trend(&vals(&[5.0])).is_none());
    }

    #[test]
    fn test_full_streak() {
        let trend = compute_trend(&vals(&[10.0, 9.0, 8.0, 7.0])).unwrap();
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.consecutive_growth_periods, 3);
    }

    #[test]
    fn test_streak_resets_at_first_break() {
        let trend = compute_trend(&vals(&[10.0, 9.0, 11.0, 7.0])).unwrap();
        assert_eq!(trend.consecutive_growth_periods, 1);
    }

    #[test]
    fn test_direction_uses_two_newest_points_only() {
        let down = compute_trend(&vals(&[8.0, 9.0, 1.0, 0.5])).unwrap();
        assert_eq!(down.direction, TrendDirection::Down);
        assert_eq!(down.consecutive_growth_periods, 0);

        let flat = compute_trend(&vals(&[9.0, 9.0, 1.0])).unwrap();
        assert_eq!(flat.direction, TrendDirection::Flat);
    }

    #[test]
    fn test_normalized_slope() {
        let trend = compute_trend(&vals(&[130.0, 120.0, 110.0, 100.0])).unwrap();
        // (130 - 100) / 3 / 100
        assert!((trend.slope.unwrap() - 0.1).abs() < 1e-12);

        let negative_base = compute_trend(&vals(&[-50.0, -100.0])).unwrap();
        assert!((negative_base.slope.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_slope_omitted_for_zero_oldest() {
        let trend = compute_trend(&vals(&[10.0, 5.0, 0.0])).unwrap();
        assert!(trend.slope.is_none());
        assert_eq!(trend.consecutive_growth_periods, 2);
    }

    #[test]
    fn test_missing_values_degrade() {
        let trend = compute_trend(&series(&[Some(10.0), None, Some(8.0)])).unwrap();
        assert_eq!(trend.direction, TrendDirection::Flat);
        assert_eq!(trend.consecutive_growth_periods, 0);
        assert!((trend.slope.unwrap() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_quarterly_yoy_uses_four_period_lookback() {
        let mut points = vals(&[120.0, 115.0, 110.0, 105.0, 100.0, 95.0]);
        apply_yoy_changes(&mut points, Timeframe::Quarterly);

        assert!((points[0].yoy_change.unwrap() - 0.2).abs() < 1e-12);
        assert!((points[1].yoy_change.unwrap() - 115.0 / 95.0 + 1.0).abs() < 1e-12);
        assert!(points[2].yoy_change.is_none());
        assert!(points[5].yoy_change.is_none());
    }

    #[test]
    fn test_annual_yoy_and_zero_guard() {
        let mut points = series(&[Some(12.0), Some(0.0), Some(-8.0), None]);
        apply_yoy_changes(&mut points, Timeframe::Annual);

        assert!(points[0].yoy_change.is_none());
        assert!((points[1].yoy_change.unwrap() - 1.0).abs() < 1e-12);
        assert!(points[2].yoy_change.is_none());
        assert!(points[3].yoy_change.is_none());
    }
}
