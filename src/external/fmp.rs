use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::FmpConfig;
use crate::external::fundamentals_source::{MarketDataProvider, SourceError};
use crate::models::QualityScores;

/// Financial Modeling Prep client for scores, TTM ratios and price targets.
pub struct FmpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FmpClient {
    pub fn new(config: &FmpConfig) -> Result<Self, SourceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(SourceError::NotConfigured("FMP_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// FMP answers every endpoint with a JSON array; the first entry is the latest.
    async fn fetch_first<T: DeserializeOwned>(&self, endpoint: &str, ticker: &str) -> Result<Option<T>, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("FMP request {} for {}", endpoint, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", ticker), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::BadResponse(format!(
                "FMP {} returned status {}",
                endpoint,
                status.as_u16()
            )));
        }

        let mut rows = resp
            .json::<Vec<T>>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.swap_remove(0)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpScore {
    altman_z_score: Option<f64>,
    piotroski_score: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpRatiosTtm {
    #[serde(rename = "grahamNumberTTM")]
    graham_number_ttm: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpPriceTargetConsensus {
    target_consensus: Option<f64>,
}

#[async_trait]
impl MarketDataProvider for FmpClient {
    async fn quality_scores(&self, ticker: &str) -> Result<QualityScores, SourceError> {
        let score = self
            .fetch_first::<FmpScore>("score", ticker)
            .await?
            .ok_or_else(|| SourceError::BadResponse(format!("no FMP score data for {}", ticker)))?;

        Ok(QualityScores {
            piotroski_score: score.piotroski_score,
            altman_z_score: score.altman_z_score,
        })
    }

    async fn ttm_graham_number(&self, ticker: &str) -> Result<Option<f64>, SourceError> {
        let ratios = self.fetch_first::<FmpRatiosTtm>("ratios-ttm", ticker).await?;
        Ok(ratios.and_then(|r| r.graham_number_ttm))
    }

    async fn price_target_consensus(&self, ticker: &str) -> Result<Option<f64>, SourceError> {
        let target = self
            .fetch_first::<FmpPriceTargetConsensus>("price-target-consensus", ticker)
            .await?;
        Ok(target.and_then(|t| t.target_consensus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = FmpConfig {
            api_key: None,
            base_url: "https://financialmodelingprep.com/stable".into(),
            timeout_secs: 10,
        };
        assert!(matches!(FmpClient::new(&config), Err(SourceError::NotConfigured(_))));
    }

    #[test]
    fn test_score_payload_parses() {
        let body = r#"[{"symbol":"AAPL","altmanZScore":7.9,"piotroskiScore":8}]"#;
        let rows: Vec<FmpScore> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].piotroski_score, Some(8));
        assert_eq!(rows[0].altman_z_score, Some(7.9));
    }

    #[test]
    fn test_ratio_and_target_payloads_parse() {
        let ratios: Vec<FmpRatiosTtm> =
            serde_json::from_str(r#"[{"symbol":"AAPL","grahamNumberTTM":31.2}]"#).unwrap();
        assert_eq!(ratios[0].graham_number_ttm, Some(31.2));

        let targets: Vec<FmpPriceTargetConsensus> =
            serde_json::from_str(r#"[{"symbol":"AAPL","targetConsensus":245.5,"targetHigh":300.0}]"#).unwrap();
        assert_eq!(targets[0].target_consensus, Some(245.5));
    }
}
