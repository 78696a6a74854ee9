//! Market-data client used by the scan loop.
//!
//! Wraps a `MarketDataSource` with the request budget and the failure
//! policy the scanner relies on: listing never errors (throttling is
//! reported as a flag), and enrichment calls degrade to empty values.

use std::sync::Arc;
use tracing::{info, warn};

use super::rate_limit::RateBudget;
use crate::feeds::{MarketDataSource, SortKey};
use crate::types::{Candidate, Overview, SecurityProfile};

/// Result of one listing call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub candidates: Vec<Candidate>,
    /// Upstream signalled rate limiting; the caller should cool down.
    pub throttled: bool,
}

impl Discovery {
    fn throttled() -> Self {
        Self {
            candidates: Vec::new(),
            throttled: true,
        }
    }
}

pub struct MarketDataClient {
    source: Arc<dyn MarketDataSource>,
    budget: Arc<dyn RateBudget>,
    fetch_limit: u32,
    sort: SortKey,
}

impl MarketDataClient {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        budget: Arc<dyn RateBudget>,
        fetch_limit: u32,
    ) -> Self {
        Self {
            source,
            budget,
            fetch_limit,
            sort: SortKey::Volume24hDesc,
        }
    }

    /// Top candidates by recent volume. Never retries.
    pub async fn list_candidates(&self) -> Discovery {
        self.budget.acquire().await;
        info!(limit = self.fetch_limit, "Requesting candidate listing");

        match self.source.list_candidates(self.fetch_limit, self.sort).await {
            Ok(candidates) => {
                info!(count = candidates.len(), "Candidate listing received");
                Discovery {
                    candidates,
                    throttled: false,
                }
            }
            Err(e) if e.is_throttled() => {
                warn!("Candidate listing rate limited");
                Discovery::throttled()
            }
            Err(e) => {
                warn!(error = %e, "Candidate listing failed");
                Discovery::default()
            }
        }
    }

    pub async fn get_overview(&self, address: &str) -> Overview {
        self.budget.acquire().await;
        match self.source.overview(address).await {
            Ok(overview) => overview,
            Err(e) if e.is_throttled() => {
                warn!(address, "Token overview rate limited, using empty overview");
                Overview::default()
            }
            Err(e) => {
                warn!(address, error = %e, "Failed to get token overview");
                Overview::default()
            }
        }
    }

    /// An empty profile means "could not verify" and is rejected downstream.
    pub async fn get_security(&self, address: &str) -> SecurityProfile {
        self.budget.acquire().await;
        match self.source.security(address).await {
            Ok(security) => security,
            Err(e) => {
                warn!(address, error = %e, "Security check failed, treating as unsafe");
                SecurityProfile::default()
            }
        }
    }

    /// Overview and security for one address, fetched concurrently.
    pub async fn enrich(&self, address: &str) -> (Overview, SecurityProfile) {
        tokio::join!(self.get_overview(address), self.get_security(address))
    }

    pub fn budget(&self) -> &Arc<dyn RateBudget> {
        &self.budget
    }
}
