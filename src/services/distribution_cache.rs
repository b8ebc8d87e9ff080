use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::models::MetricDistribution;

#[derive(Debug, Clone)]
struct CachedSector {
    cached_at: DateTime<Utc>,
    distributions: Arc<Vec<MetricDistribution>>,
}

/// Thread-safe, time-boxed cache of sector distributions keyed by sector name.
#[derive(Clone)]
pub struct DistributionCache {
    entries: Arc<DashMap<String, CachedSector>>,
    ttl: Duration,
}

impl DistributionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Cached distributions for `sector`, if present and not expired.
    pub fn get(&self, sector: &str) -> Option<Arc<Vec<MetricDistribution>>> {
        self.get_at(sector, Utc::now())
    }

    fn get_at(&self, sector: &str, now: DateTime<Utc>) -> Option<Arc<Vec<MetricDistribution>>> {
        let entry = self.entries.get(sector)?;
        if now < entry.cached_at + self.ttl {
            return Some(Arc::clone(&entry.distributions));
        }
        drop(entry); // release the read guard before removing
        self.entries.remove(sector);
        None
    }

    /// Store a non-empty distribution set; empty results are never cached.
    pub fn insert(&self, sector: &str, distributions: Vec<MetricDistribution>) -> Arc<Vec<MetricDistribution>> {
        let distributions = Arc::new(distributions);
        if !distributions.is_empty() {
            self.entries.insert(
                sector.to_string(),
                CachedSector {
                    cached_at: Utc::now(),
                    distributions: Arc::clone(&distributions),
                },
            );
        }
        distributions
    }
}
