use std::collections::BTreeMap;

use crate::models::{AltmanZone, HealthBadge, HealthComponent, HealthScore};
use crate::services::percentile_service::round1;

/// Altman Z above this is the safe zone.
pub const ALTMAN_SAFE_THRESHOLD: f64 = 2.99;
/// Altman Z below this is the distress zone.
pub const ALTMAN_DISTRESS_THRESHOLD: f64 = 1.81;

const PIOTROSKI_MAX: i32 = 9;
const PIOTROSKI_POINTS: f64 = 30.0;
const ALTMAN_SAFE_POINTS: f64 = 30.0;
const ALTMAN_GREY_POINTS: f64 = 15.0;
const FINANCIAL_HEALTH_POINTS: f64 = 25.0;
const DEBT_PERCENTILE_POINTS: f64 = 15.0;

/// The four independently scaled sub-signals. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthInputs {
    /// Piotroski F-Score, 0-9.
    pub piotroski_score: Option<i32>,
    /// Altman Z-Score.
    pub altman_z_score: Option<f64>,
    /// Percentage-based financial health score, 0-100.
    pub financial_health_score: Option<f64>,
    /// Debt/Equity sector percentile, already direction-corrected.
    pub debt_percentile: Option<f64>,
}

pub fn altman_zone(z_score: f64) -> AltmanZone {
    if z_score > ALTMAN_SAFE_THRESHOLD {
        AltmanZone::Safe
    } else if z_score < ALTMAN_DISTRESS_THRESHOLD {
        AltmanZone::Distress
    } else {
        AltmanZone::Grey
    }
}

pub fn badge_for_score(score: f64) -> HealthBadge {
    match score {
        s if s >= 80.0 => HealthBadge::Strong,
        s if s >= 65.0 => HealthBadge::Healthy,
        s if s >= 45.0 => HealthBadge::Fair,
        s if s >= 25.0 => HealthBadge::Weak,
        _ => HealthBadge::Distressed,
    }
}

/// Sum of the weighted sub-signals and the badge it maps to.
///
/// Missing inputs contribute nothing, so fewer inputs lower the reachable ceiling.
pub fn compute_health_badge(inputs: &HealthInputs) -> (HealthBadge, f64) {
    let mut score = 0.0;

    if let Some(f) = inputs.piotroski_score {
        score += f.clamp(0, PIOTROSKI_MAX) as f64 / PIOTROSKI_MAX as f64 * PIOTROSKI_POINTS;
    }

    if let Some(z) = inputs.altman_z_score.filter(|z| z.is_finite()) {
        score += if z > ALTMAN_SAFE_THRESHOLD {
            ALTMAN_SAFE_POINTS
        } else if z > ALTMAN_DISTRESS_THRESHOLD {
            ALTMAN_GREY_POINTS
        } else {
            0.0
        };
    }

    if let Some(h) = inputs.financial_health_score.filter(|h| h.is_finite()) {
        score += h.clamp(0.0, 100.0) / 100.0 * FINANCIAL_HEALTH_POINTS;
    }

    if let Some(p) = inputs.debt_percentile.filter(|p| p.is_finite()) {
        score += p.clamp(0.0, 100.0) / 100.0 * DEBT_PERCENTILE_POINTS;
    }

    (badge_for_score(score), score)
}

/// Per-signal breakdown shown next to the badge.
pub fn health_components(inputs: &HealthInputs) -> BTreeMap<String, HealthComponent> {
    let mut components = BTreeMap::new();

    if let Some(f) = inputs.piotroski_score {
        let interpretation = if f >= 7 {
            "Strong"
        } else if f <= 3 {
            "Weak"
        } else {
            "Moderate"
        };
        components.insert(
            "piotroski_f_score".to_string(),
            HealthComponent {
                value: f as f64,
                max: Some(PIOTROSKI_MAX as f64),
                zone: None,
                interpretation: interpretation.to_string(),
            },
        );
    }

    if let Some(z) = inputs.altman_z_score.filter(|z| z.is_finite()) {
        let zone = altman_zone(z);
        let interpretation = match zone {
            AltmanZone::Safe => "Healthy",
            AltmanZone::Grey => "Grey zone",
            AltmanZone::Distress => "Distress zone",
        };
        components.insert(
            "altman_z_score".to_string(),
            HealthComponent {
                value: z,
                max: None,
                zone: Some(zone),
                interpretation: interpretation.to_string(),
            },
        );
    }

    if let Some(h) = inputs.financial_health_score.filter(|h| h.is_finite()) {
        components.insert(
            "ic_financial_health".to_string(),
            HealthComponent {
                value: h,
                max: Some(100.0),
                zone: None,
                interpretation: format!("{:.0}/100", h),
            },
        );
    }

    if let Some(p) = inputs.debt_percentile.filter(|p| p.is_finite()) {
        let interpretation = if p >= 80.0 {
            "Low leverage"
        } else if p <= 20.0 {
            "High leverage"
        } else {
            "Moderate leverage"
        };
        components.insert(
            "debt_percentile".to_string(),
            HealthComponent {
                value: p.round(),
                max: None,
                zone: None,
                interpretation: interpretation.to_string(),
            },
        );
    }

    components
}

pub fn health_score(inputs: &HealthInputs) -> HealthScore {
    let (badge, score) = compute_health_badge(inputs);
    HealthScore {
        badge,
        score: round1(score),
        components: health_components(inputs),
    }
}
