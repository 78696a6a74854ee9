//! Shared types for the LAUNCHSCOUT agent.
//!
//! Value objects produced by the market-data feed and consumed by the
//! criteria evaluator and alert sinks. None of them outlive a single
//! candidate evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A newly listed asset discovered on the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque unique identifier (mint address). Primary key.
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    /// Total supply in whole tokens, when the feed reports it.
    pub supply: Option<f64>,
}

impl Candidate {
    pub fn new(address: impl Into<String>, name: &str, symbol: &str) -> Self {
        Self {
            address: address.into(),
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
            supply: None,
        }
    }

    /// Symbol for display, `?` when missing.
    pub fn symbol_or_placeholder(&self) -> &str {
        self.symbol.as_deref().unwrap_or("?")
    }

    /// Name for display, `?` when missing.
    pub fn name_or_placeholder(&self) -> &str {
        self.name.as_deref().unwrap_or("?")
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.name_or_placeholder(),
            self.symbol_or_placeholder(),
            self.address
        )
    }
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

/// Market snapshot for one address. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub liquidity: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub created_time: Option<DateTime<Utc>>,
    pub last_trade_time: Option<DateTime<Utc>>,
}

impl Overview {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Security profile
// ---------------------------------------------------------------------------

/// Safety snapshot for one address.
///
/// `extra` keeps any upstream keys we do not model, so a response that
/// carries only unrecognised fields is still "non-empty". An entirely
/// empty profile means the address could not be verified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub mint_authority_active: Option<bool>,
    pub freeze_authority_active: Option<bool>,
    pub buy_tax_pct: Option<f64>,
    pub sell_tax_pct: Option<f64>,
    pub top_holder_pct: Option<f64>,
    pub creator_balance_pct: Option<f64>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SecurityProfile {
    pub fn is_empty(&self) -> bool {
        self.mint_authority_active.is_none()
            && self.freeze_authority_active.is_none()
            && self.buy_tax_pct.is_none()
            && self.sell_tax_pct.is_none()
            && self.top_holder_pct.is_none()
            && self.creator_balance_pct.is_none()
            && self.extra.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Identifier of one acceptance rule, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    Freshness,
    MarketCapCeiling,
    ActivityFloor,
    LiquidityFloor,
    SecurityDataPresent,
    AuthoritySafety,
    TaxCeiling,
    HolderConcentration,
    NameSymbolValidity,
    SupplyCeiling,
    SymbolLengthPreference,
    Denylist,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Freshness => "freshness",
            RuleId::MarketCapCeiling => "market_cap_ceiling",
            RuleId::ActivityFloor => "activity_floor",
            RuleId::LiquidityFloor => "liquidity_floor",
            RuleId::SecurityDataPresent => "security_data_present",
            RuleId::AuthoritySafety => "authority_safety",
            RuleId::TaxCeiling => "tax_ceiling",
            RuleId::HolderConcentration => "holder_concentration",
            RuleId::NameSymbolValidity => "name_symbol_validity",
            RuleId::SupplyCeiling => "supply_ceiling",
            RuleId::SymbolLengthPreference => "symbol_length_preference",
            RuleId::Denylist => "denylist",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub accepted: bool,
    /// First hard rule violated; `None` on acceptance.
    pub fail_reason: Option<RuleId>,
    /// Human-readable detail for the failing rule.
    pub detail: Option<String>,
    /// Soft rules that flagged the candidate without rejecting it.
    pub warnings: Vec<RuleId>,
}

impl Verdict {
    pub fn accept(warnings: Vec<RuleId>) -> Self {
        Self {
            accepted: true,
            fail_reason: None,
            detail: None,
            warnings,
        }
    }

    pub fn reject(rule: RuleId, detail: String, warnings: Vec<RuleId>) -> Self {
        Self {
            accepted: false,
            fail_reason: Some(rule),
            detail: Some(detail),
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
