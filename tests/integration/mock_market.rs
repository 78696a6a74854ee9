//! In-memory market data source and alert sink for integration testing.
//!
//! The source serves a scripted listing plus per-address overview and
//! security records, and records every call so tests can assert which
//! addresses were enriched. The sink records every published alert.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use launchscout::alerts::AlertSink;
use launchscout::feeds::{MarketDataError, MarketDataSource, SortKey};
use launchscout::types::{Candidate, Overview, SecurityProfile};

/// A scripted market data source.
#[derive(Clone, Default)]
pub struct MockMarket {
    listing: Arc<Mutex<Vec<Candidate>>>,
    overviews: Arc<Mutex<HashMap<String, Overview>>>,
    securities: Arc<Mutex<HashMap<String, SecurityProfile>>>,
    /// Addresses whose detail calls fail with a transport error.
    broken: Arc<Mutex<Vec<String>>>,
    throttle_listing: Arc<Mutex<bool>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listing(&self, candidates: Vec<Candidate>) {
        *self.listing.lock().unwrap() = candidates;
    }

    /// Register a token with its overview and security records.
    pub fn add_token(&self, candidate: Candidate, overview: Overview, security: SecurityProfile) {
        let address = candidate.address.clone();
        self.listing.lock().unwrap().push(candidate);
        self.overviews.lock().unwrap().insert(address.clone(), overview);
        self.securities.lock().unwrap().insert(address, security);
    }

    pub fn break_details_for(&self, address: &str) {
        self.broken.lock().unwrap().push(address.to_string());
    }

    pub fn set_throttled(&self, throttled: bool) {
        *self.throttle_listing.lock().unwrap() = throttled;
    }

    pub fn detail_calls_for(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ends_with(&format!(":{address}")))
            .count()
    }

    pub fn listing_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("list"))
            .count()
    }

    pub fn total_detail_calls(&self) -> usize {
        let total = self.calls.lock().unwrap().len();
        total - self.listing_calls()
    }

    fn is_broken(&self, address: &str) -> bool {
        self.broken.lock().unwrap().iter().any(|a| a == address)
    }
}

#[async_trait]
impl MarketDataSource for MockMarket {
    async fn list_candidates(
        &self,
        limit: u32,
        _sort: SortKey,
    ) -> Result<Vec<Candidate>, MarketDataError> {
        self.calls.lock().unwrap().push(format!("list:{limit}"));
        if *self.throttle_listing.lock().unwrap() {
            return Err(MarketDataError::Throttled);
        }
        let listing = self.listing.lock().unwrap();
        Ok(listing.iter().take(limit as usize).cloned().collect())
    }

    async fn overview(&self, address: &str) -> Result<Overview, MarketDataError> {
        self.calls.lock().unwrap().push(format!("overview:{address}"));
        if self.is_broken(address) {
            return Err(MarketDataError::Transport("connection reset".to_string()));
        }
        Ok(self
            .overviews
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn security(&self, address: &str) -> Result<SecurityProfile, MarketDataError> {
        self.calls.lock().unwrap().push(format!("security:{address}"));
        if self.is_broken(address) {
            return Err(MarketDataError::Transport("connection reset".to_string()));
        }
        Ok(self
            .securities
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records published alerts; can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub published: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
    panic_on: Arc<Mutex<Option<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Panic instead of publishing when asked to alert on `address`.
    pub fn panic_on(&self, address: &str) {
        *self.panic_on.lock().unwrap() = Some(address.to_string());
    }

    pub fn addresses(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn publish(
        &self,
        candidate: &Candidate,
        _overview: &Overview,
        _security: &SecurityProfile,
    ) -> Result<()> {
        let explode = self.panic_on.lock().unwrap().as_deref() == Some(candidate.address.as_str());
        if explode {
            panic!("sink exploded on {}", candidate.address);
        }
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("chat API unavailable"));
        }
        self.published.lock().unwrap().push(candidate.address.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Overview that passes every market rule.
pub fn fresh_overview() -> Overview {
    Overview {
        market_cap: Some(200_000.0),
        volume_24h: Some(5_000.0),
        liquidity: Some(8_000.0),
        last_trade_time: Some(Utc::now() - Duration::seconds(60)),
        ..Overview::default()
    }
}

/// Security profile that passes every safety rule.
pub fn safe_security() -> SecurityProfile {
    SecurityProfile {
        mint_authority_active: Some(false),
        freeze_authority_active: Some(false),
        buy_tax_pct: Some(2.0),
        sell_tax_pct: Some(3.0),
        top_holder_pct: Some(10.0),
        creator_balance_pct: Some(5.0),
        ..SecurityProfile::default()
    }
}
