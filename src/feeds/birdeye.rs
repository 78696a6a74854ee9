//! Birdeye public API integration.
//!
//! Lists recently traded Solana tokens and fetches per-token overview and
//! security snapshots.
//!
//! API docs: https://docs.birdeye.so
//! Base URL: https://public-api.birdeye.so
//! Auth: `X-API-KEY` header on every request.
//!
//! The upstream schema drifts between plans and versions, so responses are
//! decoded leniently: numbers may arrive as strings, keys have aliases, and
//! any field that does not fit is treated as unknown rather than an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{MarketDataError, MarketDataSource, SortKey};
use crate::config::BirdeyeConfig;
use crate::types::{Candidate, Overview, SecurityProfile};

// ---------------------------------------------------------------------------
// Response field names
// ---------------------------------------------------------------------------

const PRICE_KEYS: &[&str] = &["price"];
const MARKET_CAP_KEYS: &[&str] = &["marketCap", "mc"];
const VOLUME_KEYS: &[&str] = &["volume24h", "v24hUSD"];
const LIQUIDITY_KEYS: &[&str] = &["liquidity"];
const PRICE_CHANGE_KEYS: &[&str] = &["priceChange24h", "priceChange24hPercent"];
const CREATED_KEYS: &[&str] = &["createdTime"];
const LAST_TRADE_KEYS: &[&str] = &["lastTradeUnixTime"];

const MINT_AUTHORITY_KEYS: &[&str] = &["mintAuthority"];
const FREEZE_AUTHORITY_KEYS: &[&str] = &["freezeAuthority"];
const BUY_TAX_KEYS: &[&str] = &["buyTax"];
const SELL_TAX_KEYS: &[&str] = &["sellTax"];
const TOP_HOLDER_KEYS: &[&str] = &["topHolderRate", "top10HolderPercent"];
const CREATOR_BALANCE_KEYS: &[&str] = &["creatorBalance", "creatorPercentage"];

// ---------------------------------------------------------------------------
// Lenient field extraction
// ---------------------------------------------------------------------------

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Remove and return the first key that parses as a number.
/// Keys that are present but unparseable stay in the map.
fn take_f64(map: &mut Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(v) = map.get(*key).and_then(as_f64) {
            map.remove(*key);
            return Some(v);
        }
    }
    None
}

fn take_string(map: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = map.get(*key) {
            let s = s.trim().to_string();
            map.remove(*key);
            if s.is_empty() {
                return None;
            }
            return Some(s);
        }
    }
    None
}

/// Unix seconds → `DateTime<Utc>`.
fn take_timestamp(map: &mut Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    let secs = take_f64(map, keys)?;
    Utc.timestamp_opt(secs as i64, 0).single()
}

/// Authority fields arrive as a bool or as the authority's address.
/// An address means the authority is still held; null means unknown.
fn take_authority(map: &mut Map<String, Value>, keys: &[&str]) -> Option<bool> {
    for key in keys {
        let parsed = match map.get(*key) {
            Some(Value::Bool(b)) => Some(*b),
            // An authority address means active; a blank one says nothing.
            Some(Value::String(s)) if !s.trim().is_empty() => Some(true),
            _ => None,
        };
        if parsed.is_some() {
            map.remove(*key);
            return parsed;
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Wire → domain conversion
// ---------------------------------------------------------------------------

/// `data` of the tokenlist response: either a bare array or
/// `{ "tokens": [...] }`.
fn parse_candidates(data: Option<Value>) -> Vec<Candidate> {
    let items = match data {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut obj)) => match obj.remove("tokens") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut map) => {
                let address = take_string(&mut map, &["address"])?;
                Some(Candidate {
                    address,
                    name: take_string(&mut map, &["name"]),
                    symbol: take_string(&mut map, &["symbol"]),
                    supply: take_f64(&mut map, &["supply", "totalSupply"]),
                })
            }
            _ => None,
        })
        .collect()
}

fn parse_overview(data: Option<Value>) -> Overview {
    let Some(Value::Object(mut map)) = data else {
        return Overview::default();
    };
    Overview {
        price: take_f64(&mut map, PRICE_KEYS),
        market_cap: take_f64(&mut map, MARKET_CAP_KEYS),
        volume_24h: take_f64(&mut map, VOLUME_KEYS),
        liquidity: take_f64(&mut map, LIQUIDITY_KEYS),
        price_change_24h: take_f64(&mut map, PRICE_CHANGE_KEYS),
        created_time: take_timestamp(&mut map, CREATED_KEYS),
        last_trade_time: take_timestamp(&mut map, LAST_TRADE_KEYS),
    }
}

fn parse_security(data: Option<Value>) -> SecurityProfile {
    let Some(Value::Object(mut map)) = data else {
        return SecurityProfile::default();
    };
    let mint_authority_active = take_authority(&mut map, MINT_AUTHORITY_KEYS);
    let freeze_authority_active = take_authority(&mut map, FREEZE_AUTHORITY_KEYS);
    let buy_tax_pct = take_f64(&mut map, BUY_TAX_KEYS);
    let sell_tax_pct = take_f64(&mut map, SELL_TAX_KEYS);
    let top_holder_pct = take_f64(&mut map, TOP_HOLDER_KEYS);
    let creator_balance_pct = take_f64(&mut map, CREATOR_BALANCE_KEYS);

    SecurityProfile {
        mint_authority_active,
        freeze_authority_active,
        buy_tax_pct,
        sell_tax_pct,
        top_holder_pct,
        creator_balance_pct,
        extra: map.into_iter().collect(),
    }
}

/// Extract `data` from the `{ "success": .., "data": .. }` envelope.
/// An empty body or a null `data` both mean "nothing".
fn unwrap_envelope(body: &str) -> Result<Option<Value>, MarketDataError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| MarketDataError::Decode(e.to_string()))?;
    match value {
        Value::Object(mut obj) => Ok(obj.remove("data").filter(|d| !d.is_null())),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Birdeye API client.
pub struct BirdeyeClient {
    http: Client,
    base_url: String,
    chain: String,
    api_key: Option<SecretString>,
    list_timeout: Duration,
    detail_timeout: Duration,
}

impl BirdeyeClient {
    /// Create a new client. Without an API key requests are sent
    /// unauthenticated and will be rejected upstream.
    pub fn new(cfg: &BirdeyeConfig, api_key: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .user_agent("LAUNCHSCOUT/0.1.0 (token-discovery-agent)")
            .build()
            .context("Failed to build HTTP client for Birdeye")?;

        if api_key.is_none() {
            error!(env = %cfg.api_key_env, "Birdeye API key is missing; requests will fail");
        }

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            chain: cfg.chain.clone(),
            api_key,
            list_timeout: Duration::from_secs(cfg.list_timeout_secs),
            detail_timeout: Duration::from_secs(cfg.detail_timeout_secs),
        })
    }

    // -- Internal helpers ------------------------------------------------

    fn url(&self, endpoint: &str, query: &[(&str, String)]) -> String {
        let qs = query
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/defi/{endpoint}?{qs}", self.base_url)
    }

    /// Issue a GET and return the envelope's `data`.
    async fn get_data(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Option<Value>, MarketDataError> {
        let url = self.url(endpoint, query);
        debug!(url = %url, "Fetching Birdeye endpoint");

        let mut req = self
            .http
            .get(&url)
            .header("x-chain", &self.chain)
            .timeout(timeout);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-KEY", key.expose_secret().as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::Throttled);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MarketDataError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        unwrap_envelope(&body)
    }

    /// Cheap one-item listing to confirm the API key is accepted.
    pub async fn verify_api_key(&self) -> Result<()> {
        info!("Testing Birdeye API key...");
        match self.list_candidates(1, SortKey::Volume24hDesc).await {
            Ok(_) => {
                info!("Birdeye API key is working");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Birdeye API key test failed");
                Err(e).context("Birdeye API key verification failed")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MarketDataSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketDataSource for BirdeyeClient {
    async fn list_candidates(
        &self,
        limit: u32,
        sort: SortKey,
    ) -> Result<Vec<Candidate>, MarketDataError> {
        let (sort_by, sort_type) = sort.as_query();
        let data = self
            .get_data(
                "tokenlist",
                &[
                    ("sort_by", sort_by.to_string()),
                    ("sort_type", sort_type.to_string()),
                    ("offset", "0".to_string()),
                    ("limit", limit.to_string()),
                ],
                self.list_timeout,
            )
            .await?;

        if data.is_none() {
            warn!("Birdeye tokenlist response carried no data");
        }
        let candidates = parse_candidates(data);
        debug!(count = candidates.len(), "Birdeye tokenlist fetched");
        Ok(candidates)
    }

    async fn overview(&self, address: &str) -> Result<Overview, MarketDataError> {
        let data = self
            .get_data(
                "token_overview",
                &[("address", address.to_string())],
                self.detail_timeout,
            )
            .await?;
        let overview = parse_overview(data);
        debug!(
            address,
            liquidity = ?overview.liquidity,
            market_cap = ?overview.market_cap,
            "Token overview fetched"
        );
        Ok(overview)
    }

    async fn security(&self, address: &str) -> Result<SecurityProfile, MarketDataError> {
        let data = self
            .get_data(
                "token_security",
                &[("address", address.to_string())],
                self.detail_timeout,
            )
            .await?;
        let security = parse_security(data);
        debug!(
            address,
            mint = ?security.mint_authority_active,
            freeze = ?security.freeze_authority_active,
            "Token security fetched"
        );
        Ok(security)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
