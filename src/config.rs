//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bot tokens) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::engine::criteria::CriteriaConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub birdeye: BirdeyeConfig,
    #[serde(default)]
    pub criteria: CriteriaConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub scan_interval_secs: u64,
    /// Start monitoring on boot without waiting for a command.
    pub auto_start: bool,
    pub auto_start_delay_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            auto_start: true,
            auto_start_delay_secs: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Candidates requested from the listing endpoint.
    pub fetch_limit: u32,
    /// Candidates examined per scan, taken from the head of the listing.
    pub scan_depth: usize,
    /// Pause after each published alert.
    pub alert_spacing_ms: u64,
    /// Cooldown after the listing endpoint signals throttling.
    pub throttle_cooldown_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 50,
            scan_depth: 20,
            alert_spacing_ms: 3_000,
            throttle_cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BirdeyeConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub chain: String,
    pub list_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    /// Token-bucket refill period: one request per interval.
    pub min_request_interval_ms: u64,
    /// Requests allowed back-to-back before the bucket throttles.
    pub request_burst: u32,
}

impl Default for BirdeyeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public-api.birdeye.so".to_string(),
            api_key_env: "BIRDEYE_API_KEY".to_string(),
            chain: "solana".to_string(),
            list_timeout_secs: 15,
            detail_timeout_secs: 10,
            min_request_interval_ms: 1_500,
            request_burst: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
    /// Listen for /monitor, /stop, /status, /criteria on the alert chat.
    pub commands_enabled: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token_env: Some("TELEGRAM_BOT_TOKEN".to_string()),
            telegram_chat_id_env: Some("TELEGRAM_CHAT_ID".to_string()),
            commands_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
