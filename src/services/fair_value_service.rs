use std::collections::BTreeMap;

use crate::models::{
    AnalystConsensus, Confidence, FairValueMetrics, FairValueModel, FairValueReport,
    MarginOfSafety, ValuationZone,
};

/// Deviation band (in percent) treated as fairly valued.
pub const FAIR_VALUE_BAND_PERCENT: f64 = 15.0;

/// Whatever the upstream valuation sources returned for one ticker.
#[derive(Debug, Clone, Default)]
pub struct FairValueInputs {
    pub stored: Option<FairValueMetrics>,
    /// Graham number from the market-data provider's TTM ratios.
    pub ttm_graham_number: Option<f64>,
    pub analyst_target: Option<f64>,
}

fn usable_price(current_price: Option<f64>) -> Option<f64> {
    current_price.filter(|p| p.is_finite() && *p != 0.0)
}

/// Percentage gap between an estimate and the current price.
/// Only a positive price yields an upside.
pub fn upside_percent(fair_value: f64, current_price: Option<f64>) -> Option<f64> {
    let price = current_price.filter(|p| p.is_finite() && *p > 0.0)?;
    let upside = (fair_value - price) / price * 100.0;
    upside.is_finite().then_some(upside)
}

/// Average the available fair-value estimates and classify against the price.
///
/// Returns `None` when there is no usable price or no model produced a value.
pub fn compute_margin_of_safety(
    models: &BTreeMap<String, FairValueModel>,
    current_price: Option<f64>,
) -> Option<MarginOfSafety> {
    let price = usable_price(current_price)?;

    let estimates: Vec<f64> = models
        .values()
        .filter_map(|m| m.fair_value)
        .filter(|v| v.is_finite())
        .collect();
    if estimates.is_empty() {
        return None;
    }

    let avg_fair_value = estimates.iter().sum::<f64>() / estimates.len() as f64;
    let deviation = (avg_fair_value - price) / price * 100.0;

    let (zone, description) = if deviation > FAIR_VALUE_BAND_PERCENT {
        (
            ValuationZone::Undervalued,
            format!(
                "Stock may be undervalued: trading {:.1}% below average fair value estimate",
                deviation
            ),
        )
    } else if deviation < -FAIR_VALUE_BAND_PERCENT {
        (
            ValuationZone::Overvalued,
            format!(
                "Stock may be overvalued: trading {:.1}% above average fair value estimate",
                deviation.abs()
            ),
        )
    } else {
        (
            ValuationZone::FairlyValued,
            format!(
                "Stock is trading within {:.0}% of average fair value estimate",
                FAIR_VALUE_BAND_PERCENT
            ),
        )
    };

    Some(MarginOfSafety {
        avg_fair_value,
        deviation_percent: deviation,
        zone,
        description,
    })
}

fn priced_model(fair_value: f64, confidence: Confidence, current_price: Option<f64>) -> FairValueModel {
    let mut model = FairValueModel::new(Some(fair_value), confidence);
    model.upside_percent = upside_percent(fair_value, current_price);
    model
}

/// Assemble the per-model estimates, analyst consensus and verdict.
pub fn build_fair_value_report(ticker: &str, inputs: &FairValueInputs) -> FairValueReport {
    let stored = inputs.stored.as_ref();
    let current_price = stored.and_then(|s| s.stock_price);

    let mut models = BTreeMap::new();

    if let Some(dcf_value) = stored.and_then(|s| s.dcf_fair_value) {
        let mut dcf = priced_model(dcf_value, Confidence::Medium, current_price);
        if let Some(wacc) = stored.and_then(|s| s.wacc) {
            dcf.inputs.insert("wacc".to_string(), wacc);
        }
        models.insert("dcf".to_string(), dcf);
    }

    let graham = stored
        .and_then(|s| s.graham_number)
        .or(inputs.ttm_graham_number);
    if let Some(graham_value) = graham {
        models.insert(
            "graham_number".to_string(),
            priced_model(graham_value, Confidence::High, current_price),
        );
    }

    if let Some(epv_value) = stored.and_then(|s| s.epv_fair_value) {
        models.insert(
            "epv".to_string(),
            priced_model(epv_value, Confidence::Medium, current_price),
        );
    }

    let suppressed = models.is_empty();
    let suppression_reason = suppressed
        .then(|| "Insufficient financial data to compute fair value estimates".to_string());

    let analyst_consensus = inputs.analyst_target.map(|target| AnalystConsensus {
        target_price: target,
        upside_percent: upside_percent(target, current_price),
    });

    let margin_of_safety = compute_margin_of_safety(&models, current_price);

    FairValueReport {
        ticker: ticker.to_string(),
        current_price,
        models,
        analyst_consensus,
        margin_of_safety,
        suppressed,
        suppression_reason,
    }
}
