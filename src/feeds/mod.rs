//! Remote market-data sources.
//!
//! Defines the `MarketDataSource` trait consumed by the engine and the
//! error taxonomy that keeps "rate-limited" distinguishable from every
//! other failure.

pub mod birdeye;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Candidate, Overview, SecurityProfile};

/// Ordering requested from the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// 24-hour trading volume in USD, descending.
    Volume24hDesc,
    /// Liquidity in USD, descending.
    LiquidityDesc,
}

impl SortKey {
    /// `(sort_by, sort_type)` query parameters.
    pub fn as_query(&self) -> (&'static str, &'static str) {
        match self {
            SortKey::Volume24hDesc => ("v24hUSD", "desc"),
            SortKey::LiquidityDesc => ("liquidity", "desc"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Upstream signalled its rate budget is exhausted (HTTP 429).
    #[error("rate limited by upstream")]
    Throttled,
    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl MarketDataError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, MarketDataError::Throttled)
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MarketDataError::Decode(e.to_string())
        } else {
            MarketDataError::Transport(e.to_string())
        }
    }
}

/// Abstraction over the remote API that lists and describes assets.
///
/// Implementations return `Ok` with empty values for "not found" and
/// reserve `Err` for transport, protocol and throttling failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Ranked list of recently traded assets.
    async fn list_candidates(
        &self,
        limit: u32,
        sort: SortKey,
    ) -> Result<Vec<Candidate>, MarketDataError>;

    /// Market snapshot for one address.
    async fn overview(&self, address: &str) -> Result<Overview, MarketDataError>;

    /// Safety snapshot for one address.
    async fn security(&self, address: &str) -> Result<SecurityProfile, MarketDataError>;
}
