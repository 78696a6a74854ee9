//! Acceptance policy for discovered tokens.
//!
//! An ordered list of named rules evaluated over a uniform context.
//! Evaluation stops at the first hard failure; soft rules only record a
//! warning. Rule order is part of the contract: the first failing rule is
//! reported as the rejection reason.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::types::{Candidate, Overview, RuleId, SecurityProfile, Verdict};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

/// Established or major symbols that are never alerted on.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "SOL", "USDC", "USDT", "WETH", "WBTC", "BTC", "ETH", "JUP", "RAY", "BONK", "TRUMP",
    "PENGU", "JITOSOL", "JLP", "CBBTC", "FARTCOIN", "PUMP", "PEPE", "PEPECOIN", "DOGEWIF",
    "LILPEPE", "WALMART", "PORNHUB", "GENES", "IMMORTAL", "BUCKY", "RAI",
];

/// Thresholds for every rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    /// Maximum age of the creation (or last trade) timestamp.
    pub max_age_secs: i64,
    /// Without any timestamp, only tokens below this market cap count as new.
    pub untimed_max_market_cap: f64,
    pub max_market_cap: f64,
    pub min_volume_24h: f64,
    pub min_liquidity: f64,
    /// Buy or sell tax at or above this rejects.
    pub max_tax_pct: f64,
    pub max_top_holder_pct: f64,
    pub max_creator_balance_pct: f64,
    pub min_symbol_len: usize,
    pub max_symbol_len: usize,
    pub preferred_symbol_len_min: usize,
    pub preferred_symbol_len_max: usize,
    pub max_supply: f64,
    /// Added to `DEFAULT_DENYLIST`.
    pub extra_denylist: Vec<String>,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 5 * 60,
            untimed_max_market_cap: 100_000.0,
            max_market_cap: 10_000_000.0,
            min_volume_24h: 1_000.0,
            min_liquidity: 5_000.0,
            max_tax_pct: 10.0,
            max_top_holder_pct: 20.0,
            max_creator_balance_pct: 30.0,
            min_symbol_len: 1,
            max_symbol_len: 10,
            preferred_symbol_len_min: 3,
            preferred_symbol_len_max: 6,
            max_supply: 1_000_000_000.0,
            extra_denylist: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Denylist
// ---------------------------------------------------------------------------

/// Case-insensitive symbol set.
#[derive(Debug, Clone)]
pub struct Denylist {
    symbols: HashSet<String>,
}

impl Denylist {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, symbol: Option<&str>) -> bool {
        symbol
            .map(|s| self.symbols.contains(&s.trim().to_uppercase()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Failure rejects the candidate.
    Hard,
    /// Failure is logged as a warning only.
    Soft,
}

/// Everything a rule may look at.
pub struct EvalContext<'a> {
    pub candidate: &'a Candidate,
    pub overview: &'a Overview,
    pub security: &'a SecurityProfile,
    pub now: DateTime<Utc>,
    pub config: &'a CriteriaConfig,
    pub denylist: &'a Denylist,
}

/// `Err` carries a human-readable explanation.
type Check = fn(&EvalContext<'_>) -> Result<(), String>;

pub struct Rule {
    pub id: RuleId,
    pub severity: Severity,
    check: Check,
}

impl Rule {
    pub fn check(&self, ctx: &EvalContext<'_>) -> Result<(), String> {
        (self.check)(ctx)
    }
}

/// The policy, in evaluation order.
#[rustfmt::skip]
pub const RULES: &[Rule] = &[
    Rule { id: RuleId::Freshness, severity: Severity::Hard, check: check_freshness },
    Rule { id: RuleId::MarketCapCeiling, severity: Severity::Hard, check: check_market_cap },
    Rule { id: RuleId::ActivityFloor, severity: Severity::Hard, check: check_activity },
    Rule { id: RuleId::LiquidityFloor, severity: Severity::Hard, check: check_liquidity },
    Rule { id: RuleId::SecurityDataPresent, severity: Severity::Hard, check: check_security_present },
    Rule { id: RuleId::AuthoritySafety, severity: Severity::Hard, check: check_authorities },
    Rule { id: RuleId::TaxCeiling, severity: Severity::Hard, check: check_taxes },
    Rule { id: RuleId::HolderConcentration, severity: Severity::Hard, check: check_holders },
    Rule { id: RuleId::NameSymbolValidity, severity: Severity::Hard, check: check_name_symbol },
    Rule { id: RuleId::SupplyCeiling, severity: Severity::Hard, check: check_supply },
    Rule { id: RuleId::SymbolLengthPreference, severity: Severity::Soft, check: check_symbol_preference },
    Rule { id: RuleId::Denylist, severity: Severity::Hard, check: check_denylist },
];

fn check_freshness(ctx: &EvalContext<'_>) -> Result<(), String> {
    let max_age = Duration::seconds(ctx.config.max_age_secs);
    let o = ctx.overview;

    if let Some(created) = o.created_time {
        let age = ctx.now - created;
        if age > max_age {
            return Err(format!(
                "token too old: {}s (max {}s)",
                age.num_seconds(),
                max_age.num_seconds()
            ));
        }
        return Ok(());
    }

    if let Some(last_trade) = o.last_trade_time {
        let idle = ctx.now - last_trade;
        if idle > max_age {
            return Err(format!(
                "inactive for too long: {}s since last trade",
                idle.num_seconds()
            ));
        }
        return Ok(());
    }

    match o.market_cap {
        Some(mc) if mc < ctx.config.untimed_max_market_cap => Ok(()),
        Some(mc) => Err(format!(
            "no timing data and market cap too high for a new token: ${mc:.0}"
        )),
        None => Err("no timing data and market cap unknown".to_string()),
    }
}

fn check_market_cap(ctx: &EvalContext<'_>) -> Result<(), String> {
    match ctx.overview.market_cap {
        Some(mc) if mc > ctx.config.max_market_cap => {
            Err(format!("market cap too high for a new token: ${mc:.0}"))
        }
        _ => Ok(()),
    }
}

fn check_activity(ctx: &EvalContext<'_>) -> Result<(), String> {
    match ctx.overview.volume_24h {
        Some(v) if v >= ctx.config.min_volume_24h => Ok(()),
        Some(v) => Err(format!("insufficient trading activity: ${v:.0}")),
        None => Err("trading activity unknown".to_string()),
    }
}

fn check_liquidity(ctx: &EvalContext<'_>) -> Result<(), String> {
    let liquidity = ctx.overview.liquidity.unwrap_or(0.0);
    if liquidity < ctx.config.min_liquidity {
        return Err(format!("liquidity too low: ${liquidity:.0}"));
    }
    Ok(())
}

fn check_security_present(ctx: &EvalContext<'_>) -> Result<(), String> {
    if ctx.security.is_empty() {
        return Err("no security data available, treating as unsafe".to_string());
    }
    Ok(())
}

fn check_authorities(ctx: &EvalContext<'_>) -> Result<(), String> {
    if ctx.security.mint_authority_active == Some(true) {
        return Err("mint authority still active".to_string());
    }
    if ctx.security.freeze_authority_active == Some(true) {
        return Err("freeze authority still active".to_string());
    }
    Ok(())
}

fn check_taxes(ctx: &EvalContext<'_>) -> Result<(), String> {
    let buy = ctx.security.buy_tax_pct.unwrap_or(0.0);
    let sell = ctx.security.sell_tax_pct.unwrap_or(0.0);
    if buy >= ctx.config.max_tax_pct {
        return Err(format!("buy tax too high: {buy}%"));
    }
    if sell >= ctx.config.max_tax_pct {
        return Err(format!("sell tax too high: {sell}%"));
    }
    Ok(())
}

fn check_holders(ctx: &EvalContext<'_>) -> Result<(), String> {
    if let Some(top) = ctx.security.top_holder_pct {
        if top > ctx.config.max_top_holder_pct {
            return Err(format!("whale concentration too high: {top}%"));
        }
    }
    if let Some(creator) = ctx.security.creator_balance_pct {
        if creator > ctx.config.max_creator_balance_pct {
            return Err(format!("creator holds too much: {creator}%"));
        }
    }
    Ok(())
}

fn looks_placeholder(s: &str) -> bool {
    s.contains('?') || s.to_lowercase().contains("unknown")
}

fn check_name_symbol(ctx: &EvalContext<'_>) -> Result<(), String> {
    let name = ctx.candidate.name.as_deref().filter(|s| !s.is_empty());
    let symbol = ctx.candidate.symbol.as_deref().filter(|s| !s.is_empty());

    let (Some(name), Some(symbol)) = (name, symbol) else {
        return Err("missing name or symbol".to_string());
    };
    if looks_placeholder(name) {
        return Err(format!("invalid name: {name:?}"));
    }
    if looks_placeholder(symbol) {
        return Err(format!("invalid symbol: {symbol:?}"));
    }

    let len = symbol.chars().count();
    if len < ctx.config.min_symbol_len || len > ctx.config.max_symbol_len {
        return Err(format!("invalid symbol length: {symbol:?} ({len} chars)"));
    }
    Ok(())
}

fn check_supply(ctx: &EvalContext<'_>) -> Result<(), String> {
    match ctx.candidate.supply {
        Some(supply) if supply > ctx.config.max_supply => {
            Err(format!("max supply too high: {supply:.0}"))
        }
        _ => Ok(()),
    }
}

fn check_symbol_preference(ctx: &EvalContext<'_>) -> Result<(), String> {
    let Some(symbol) = ctx.candidate.symbol.as_deref() else {
        return Ok(());
    };
    let len = symbol.chars().count();
    if len < ctx.config.preferred_symbol_len_min || len > ctx.config.preferred_symbol_len_max {
        return Err(format!("symbol length not optimal: {symbol} ({len} chars)"));
    }
    Ok(())
}

fn check_denylist(ctx: &EvalContext<'_>) -> Result<(), String> {
    if ctx.denylist.contains(ctx.candidate.symbol.as_deref()) {
        return Err(format!(
            "established token: {}",
            ctx.candidate.symbol_or_placeholder()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Pure decision function over the rule list.
pub struct CriteriaEvaluator {
    config: CriteriaConfig,
    denylist: Denylist,
}

impl CriteriaEvaluator {
    pub fn new(config: CriteriaConfig) -> Self {
        let denylist = Denylist::new(
            DEFAULT_DENYLIST
                .iter()
                .map(|s| s.to_string())
                .chain(config.extra_denylist.iter().cloned()),
        );
        Self { config, denylist }
    }

    pub fn config(&self) -> &CriteriaConfig {
        &self.config
    }

    pub fn is_denylisted(&self, symbol: Option<&str>) -> bool {
        self.denylist.contains(symbol)
    }

    pub fn denylist_len(&self) -> usize {
        self.denylist.len()
    }

    /// Evaluate every rule in order, stopping at the first hard failure.
    pub fn evaluate(
        &self,
        candidate: &Candidate,
        overview: &Overview,
        security: &SecurityProfile,
        now: DateTime<Utc>,
    ) -> Verdict {
        let ctx = EvalContext {
            candidate,
            overview,
            security,
            now,
            config: &self.config,
            denylist: &self.denylist,
        };

        let mut warnings = Vec::new();
        for rule in RULES {
            match (rule.check(&ctx), rule.severity) {
                (Ok(()), _) => {
                    debug!(address = %candidate.address, rule = %rule.id, "Rule passed");
                }
                (Err(detail), Severity::Soft) => {
                    warn!(
                        address = %candidate.address,
                        rule = %rule.id,
                        detail = %detail,
                        "Soft rule flagged, allowing"
                    );
                    warnings.push(rule.id);
                }
                (Err(detail), Severity::Hard) => {
                    info!(
                        address = %candidate.address,
                        symbol = candidate.symbol_or_placeholder(),
                        rule = %rule.id,
                        detail = %detail,
                        "Candidate rejected"
                    );
                    return Verdict::reject(rule.id, detail, warnings);
                }
            }
        }

        info!(
            address = %candidate.address,
            symbol = candidate.symbol_or_placeholder(),
            "Candidate passes all criteria"
        );
        Verdict::accept(warnings)
    }

    /// Human-readable summary of the active thresholds.
    pub fn describe(&self) -> String {
        let c = &self.config;
        format!(
            "Token criteria\n\
             \n\
             1. Freshness: created or last traded within {}s \
             (no timestamps: market cap under ${:.0})\n\
             2. Market cap at most ${:.0}\n\
             3. 24h volume at least ${:.0}\n\
             4. Liquidity at least ${:.0}\n\
             5. Security data available\n\
             6. No mint or freeze authority\n\
             7. Buy and sell tax below {}%\n\
             8. Top holder at most {}%, creator at most {}%\n\
             9. Name and symbol present, no \"?\" or \"unknown\", symbol {}-{} chars\n\
             10. Supply at most {:.0}\n\
             11. Preferred symbol length {}-{} chars (warning only)\n\
             12. Not one of {} established symbols\n\
             \n\
             Alerts fire only when every hard rule passes.",
            c.max_age_secs,
            c.untimed_max_market_cap,
            c.max_market_cap,
            c.min_volume_24h,
            c.min_liquidity,
            c.max_tax_pct,
            c.max_top_holder_pct,
            c.max_creator_balance_pct,
            c.min_symbol_len,
            c.max_symbol_len,
            c.max_supply,
            c.preferred_symbol_len_min,
            c.preferred_symbol_len_max,
            self.denylist.len(),
        )
    }
}

impl Default for CriteriaEvaluator {
    fn default() -> Self {
        Self::new(CriteriaConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
