//! Alert delivery.
//!
//! Defines the `AlertSink` trait the scanner publishes accepted tokens to,
//! the shared alert renderer, and a log-only sink for dry runs.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::types::{Candidate, Overview, SecurityProfile};

/// Destination for accepted candidates.
///
/// Failures are reported to the caller, which logs them; sinks must not
/// retry on their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(
        &self,
        candidate: &Candidate,
        overview: &Overview,
        security: &SecurityProfile,
    ) -> Result<()>;
}

/// Writes alerts to the log instead of a chat. Used when no messaging
/// credentials are configured.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn publish(
        &self,
        candidate: &Candidate,
        overview: &Overview,
        _security: &SecurityProfile,
    ) -> Result<()> {
        info!(
            address = %candidate.address,
            name = candidate.name_or_placeholder(),
            symbol = candidate.symbol_or_placeholder(),
            price = ?overview.price,
            market_cap = ?overview.market_cap,
            liquidity = ?overview.liquidity,
            volume_24h = ?overview.volume_24h,
            "NEW TOKEN ALERT (dry run)"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Format a dollar amount with thousands separators, no decimals.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}

/// Escape characters that legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '[' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn authority_label(active: Option<bool>) -> &'static str {
    match active {
        Some(false) => "Renounced ✅",
        _ => "Unknown ⚠️",
    }
}

/// Human form of the freshness window, e.g. "5 minutes" or "90 seconds".
pub fn format_window(secs: i64) -> String {
    let (n, unit) = if secs != 0 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Markdown alert body for an accepted token. `max_age_secs` is the
/// freshness window the token was screened against.
pub fn render_alert(
    candidate: &Candidate,
    overview: &Overview,
    security: &SecurityProfile,
    max_age_secs: i64,
) -> String {
    let address = &candidate.address;
    let name = escape_markdown(candidate.name.as_deref().unwrap_or("Unknown"));
    let symbol = escape_markdown(candidate.symbol.as_deref().unwrap_or("Unknown"));

    let price = overview
        .price
        .map(|p| format!("${p:.8}"))
        .unwrap_or_else(|| "New".to_string());
    let market_cap = overview
        .market_cap
        .map(|v| format!("${}", group_thousands(v)))
        .unwrap_or_else(|| "Low".to_string());
    let liquidity = overview
        .liquidity
        .map(|v| format!("${}", group_thousands(v)))
        .unwrap_or_else(|| "Unknown".to_string());
    let volume = overview
        .volume_24h
        .map(|v| format!("${}", group_thousands(v)))
        .unwrap_or_else(|| "New".to_string());

    format!(
        "🚨 *NEW TOKEN DETECTED!* 🚨\n\
         \n\
         💎 *{name}* ({symbol})\n\
         📍 `{address}`\n\
         \n\
         💰 *Price:* {price}\n\
         📊 *Market Cap:* {market_cap}\n\
         💧 *Liquidity:* {liquidity}\n\
         📈 *24h Volume:* {volume}\n\
         \n\
         🛡️ *Safety Checks:*\n\
         ✅ Name/Symbol valid\n\
         ✅ Mint Authority: {mint}\n\
         ✅ Freeze Authority: {freeze}\n\
         ✅ Fresh: active within the last {window}\n\
         \n\
         🔗 *Quick Actions:*\n\
         [🔍 Solscan](https://solscan.io/token/{address}) | \
         [📊 DexScreener](https://dexscreener.com/solana/{address}) | \
         [🔄 Jupiter](https://jup.ag/swap/SOL-{address})",
        mint = authority_label(security.mint_authority_active),
        freeze = authority_label(security.freeze_authority_active),
        window = format_window(max_age_secs),
    )
}
