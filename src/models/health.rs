use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Five ordered health tiers, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthBadge {
    Strong,
    Healthy,
    Fair,
    Weak,
    Distressed,
}

impl HealthBadge {
    pub fn label(&self) -> &'static str {
        match self {
            HealthBadge::Strong => "Strong",
            HealthBadge::Healthy => "Healthy",
            HealthBadge::Fair => "Fair",
            HealthBadge::Weak => "Weak",
            HealthBadge::Distressed => "Distressed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltmanZone {
    Safe,
    Grey,
    Distress,
}

/// One scored sub-signal of the composite health badge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthComponent {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<AltmanZone>,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub badge: HealthBadge,
    pub score: f64,
    pub components: BTreeMap<String, HealthComponent>,
}

/// A strength or concern derived from a sector percentile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub metric: String,
    pub value: Option<f64>,
    pub percentile: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedFlag {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub related_metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InsightSet {
    pub strengths: Vec<Insight>,
    pub concerns: Vec<Insight>,
    pub red_flags: Vec<RedFlag>,
}

/// How many of the independent upstream sources answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Full,
    Partial,
    Insufficient,
}

impl DataQuality {
    pub fn from_sources(sources_available: usize) -> Self {
        match sources_available {
            0 => DataQuality::Insufficient,
            1..=2 => DataQuality::Partial,
            _ => DataQuality::Full,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleInfo {
    pub stage: String,
    pub description: String,
    pub classified_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub ticker: String,
    pub sector: String,
    pub health: HealthScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleInfo>,
    pub strengths: Vec<Insight>,
    pub concerns: Vec<Insight>,
    pub red_flags: Vec<RedFlag>,
    pub data_quality: DataQuality,
    pub sources_available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_quality_tiers() {
        assert_eq!(DataQuality::from_sources(0), DataQuality::Insufficient);
        assert_eq!(DataQuality::from_sources(1), DataQuality::Partial);
        assert_eq!(DataQuality::from_sources(2), DataQuality::Partial);
        assert_eq!(DataQuality::from_sources(3), DataQuality::Full);
        assert_eq!(DataQuality::from_sources(5), DataQuality::Full);
    }

    #[test]
    fn test_badge_serializes_as_label() {
        let json = serde_json::to_string(&HealthBadge::Healthy).unwrap();
        assert_eq!(json, "\"Healthy\"");
    }
}
