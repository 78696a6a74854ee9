//! LAUNCHSCOUT: new-token discovery and alerting agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the market-data client, evaluator and alert sink into the monitor,
//! starts the command surfaces, and runs until Ctrl+C or SIGTERM.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use launchscout::alerts::telegram::{CommandListener, TelegramAlertSink, TelegramBot};
use launchscout::alerts::{AlertSink, LogAlertSink};
use launchscout::api::{self, ApiState};
use launchscout::config::{self, AppConfig};
use launchscout::engine::criteria::CriteriaEvaluator;
use launchscout::engine::market_data::MarketDataClient;
use launchscout::engine::monitor::{MonitorController, MonitorSwitch};
use launchscout::engine::rate_limit::TokenBucket;
use launchscout::engine::scanner::{ScanOrchestrator, ScanSettings};
use launchscout::feeds::birdeye::BirdeyeClient;

const BANNER: &str = r#"
 _                       _                         _
| | __ _ _   _ _ __   ___| |__  ___  ___ ___  _   _| |_
| |/ _` | | | | '_ \ / __| '_ \/ __|/ __/ _ \| | | | __|
| | (_| | |_| | | | | (__| | | \__ \ (_| (_) | |_| | |_
|_|\__,_|\__,_|_| |_|\___|_| |_|___/\___\___/ \__,_|\__|
  New-token discovery agent v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();
    println!("{BANNER}");

    info!(
        scan_interval_secs = cfg.monitor.scan_interval_secs,
        fetch_limit = cfg.scanner.fetch_limit,
        scan_depth = cfg.scanner.scan_depth,
        chain = %cfg.birdeye.chain,
        "LAUNCHSCOUT starting up"
    );

    // -- Initialise components -------------------------------------------

    let api_key = AppConfig::resolve_env(&cfg.birdeye.api_key_env)
        .ok()
        .filter(|k| !k.is_empty())
        .map(SecretString::new);
    let birdeye = Arc::new(BirdeyeClient::new(&cfg.birdeye, api_key)?);

    if let Err(e) = birdeye.verify_api_key().await {
        warn!(error = %e, "Continuing without a verified API key");
    }

    let budget = Arc::new(TokenBucket::new(
        Duration::from_millis(cfg.birdeye.min_request_interval_ms),
        cfg.birdeye.request_burst,
    ));
    let client = MarketDataClient::new(birdeye, budget, cfg.scanner.fetch_limit);
    let evaluator = CriteriaEvaluator::new(cfg.criteria.clone());

    let bot = telegram_bot(&cfg)?;
    let sink: Arc<dyn AlertSink> = match &bot {
        Some(bot) => {
            info!(chat_id = bot.chat_id(), "Alerts will be sent to Telegram");
            Arc::new(TelegramAlertSink::new(bot.clone(), cfg.criteria.max_age_secs))
        }
        None => {
            warn!("No Telegram credentials configured, alerts will only be logged");
            Arc::new(LogAlertSink)
        }
    };

    let orchestrator = Arc::new(ScanOrchestrator::new(
        client,
        evaluator,
        sink,
        MonitorSwitch::new(),
        ScanSettings::from(&cfg.scanner),
    ));
    let controller = Arc::new(MonitorController::new(
        orchestrator,
        Duration::from_secs(cfg.monitor.scan_interval_secs),
    ));

    // -- Command surfaces ------------------------------------------------

    let mut tasks = Vec::new();

    if cfg.alerts.commands_enabled {
        if let Some(bot) = &bot {
            let listener = CommandListener::new(bot.clone(), controller.clone());
            tasks.push(tokio::spawn(listener.run()));
        }
    }

    if cfg.api.enabled {
        let state = Arc::new(ApiState::new(controller.clone()));
        match api::spawn_api(state, cfg.api.port).await {
            Ok(handle) => tasks.push(handle),
            Err(e) => error!(error = %e, "Control API disabled"),
        }
    }

    if cfg.monitor.auto_start {
        let controller = controller.clone();
        let delay = Duration::from_secs(cfg.monitor.auto_start_delay_secs);
        info!(delay_secs = delay.as_secs(), "Auto-starting monitoring");
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.start();
        }));
    }

    // -- Run until Ctrl+C or SIGTERM --------------------------------------

    info!("Running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    info!("Shutdown signal received");
    controller.shutdown();
    for task in &tasks {
        task.abort();
    }

    let status = controller.status().await;
    info!(
        total_processed = status.total_processed,
        "LAUNCHSCOUT shut down cleanly"
    );
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => info!("SIGTERM received"),
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for SIGTERM");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}

/// Telegram bot when both the token and chat id resolve.
fn telegram_bot(cfg: &AppConfig) -> Result<Option<Arc<TelegramBot>>> {
    let resolve = |name: &Option<String>| {
        name.as_deref()
            .and_then(|env| AppConfig::resolve_env(env).ok())
            .filter(|v| !v.is_empty())
    };

    match (
        resolve(&cfg.alerts.telegram_bot_token_env),
        resolve(&cfg.alerts.telegram_chat_id_env),
    ) {
        (Some(token), Some(chat_id)) => {
            let bot = TelegramBot::new(SecretString::new(token), chat_id)?;
            Ok(Some(Arc::new(bot)))
        }
        _ => Ok(None),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("launchscout=info"));

    let json_logging = std::env::var("LAUNCHSCOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
