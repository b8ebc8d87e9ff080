use std::net::SocketAddr;
use std::str::FromStr;

use crate::services::insight_service::DEFAULT_INSIGHT_LIMIT;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL is not set".to_string())?;

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid BIND_ADDR: {}", e))?;

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            bind_addr,
        })
    }
}

/// Tunables for the insight endpoints.
#[derive(Debug, Clone)]
pub struct InsightConfig {
    pub strengths_limit: usize,
    pub concerns_limit: usize,
    pub request_timeout_secs: u64,
    pub percentile_cache_ttl_secs: i64,
    pub peers_default_limit: i64,
    pub peers_max_limit: i64,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            strengths_limit: DEFAULT_INSIGHT_LIMIT,
            concerns_limit: DEFAULT_INSIGHT_LIMIT,
            request_timeout_secs: 10,
            percentile_cache_ttl_secs: 3600,
            peers_default_limit: 5,
            peers_max_limit: 10,
            history_default_limit: 20,
            history_max_limit: 40,
        }
    }
}

impl InsightConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            strengths_limit: env_or("INSIGHT_STRENGTHS_LIMIT", d.strengths_limit),
            concerns_limit: env_or("INSIGHT_CONCERNS_LIMIT", d.concerns_limit),
            request_timeout_secs: env_or("INSIGHT_REQUEST_TIMEOUT_SECS", d.request_timeout_secs),
            percentile_cache_ttl_secs: env_or("SECTOR_PERCENTILE_CACHE_TTL_SECS", d.percentile_cache_ttl_secs),
            peers_default_limit: env_or("PEERS_DEFAULT_LIMIT", d.peers_default_limit),
            peers_max_limit: env_or("PEERS_MAX_LIMIT", d.peers_max_limit),
            history_default_limit: env_or("HISTORY_DEFAULT_LIMIT", d.history_default_limit),
            history_max_limit: env_or("HISTORY_MAX_LIMIT", d.history_max_limit),
        }
    }

    /// Requested limit if within `1..=max`, otherwise the default.
    pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
        match requested {
            Some(n) if n > 0 && n <= max => n,
            _ => default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FmpConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl FmpConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("FMP_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("FMP_BASE_URL")
                .unwrap_or_else(|_| "https://financialmodelingprep.com/stable".to_string()),
            timeout_secs: env_or("FMP_TIMEOUT_SECS", 10),
        }
    }
}
