//! Telegram Bot API: alert sink and command listener.
//!
//! The sink posts rendered alerts to the configured chat. The listener
//! long-polls `getUpdates` and maps /monitor, /stop, /status and
//! /criteria onto the monitor controller.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{format_window, render_alert, AlertSink};
use crate::engine::monitor::{MonitorController, MonitorState, StartOutcome};
use crate::types::{Candidate, Overview, SecurityProfile};

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll window passed to getUpdates.
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

// ---------------------------------------------------------------------------
// Bot client
// ---------------------------------------------------------------------------

/// Minimal Bot API client bound to one chat.
pub struct TelegramBot {
    http: Client,
    token: SecretString,
    chat_id: String,
}

impl TelegramBot {
    pub fn new(token: SecretString, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            http,
            token,
            chat_id,
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token.expose_secret())
    }

    /// Send a message to the bound chat. `parse_mode` of `None` sends plain text.
    pub async fn send_message(&self, text: &str, parse_mode: Option<&str>) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Telegram sendMessage returned {status}: {body}");
        }
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let resp = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
            ])
            .send()
            .await
            .context("Telegram getUpdates request failed")?;

        let parsed: ApiResponse<Vec<Update>> = resp
            .json()
            .await
            .context("Failed to parse Telegram getUpdates response")?;
        if !parsed.ok {
            bail!(
                "Telegram getUpdates error: {}",
                parsed.description.unwrap_or_default()
            );
        }
        Ok(parsed.result.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Alert sink
// ---------------------------------------------------------------------------

pub struct TelegramAlertSink {
    bot: Arc<TelegramBot>,
    max_age_secs: i64,
}

impl TelegramAlertSink {
    pub fn new(bot: Arc<TelegramBot>, max_age_secs: i64) -> Self {
        Self { bot, max_age_secs }
    }
}

#[async_trait]
impl AlertSink for TelegramAlertSink {
    async fn publish(
        &self,
        candidate: &Candidate,
        overview: &Overview,
        security: &SecurityProfile,
    ) -> Result<()> {
        let text = render_alert(candidate, overview, security, self.max_age_secs);
        self.bot.send_message(&text, Some("Markdown")).await?;
        info!(address = %candidate.address, "Alert sent to Telegram");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Monitor,
    Stop,
    Status,
    Criteria,
    Unknown(String),
}

/// Parse a chat message into a command. Non-command text yields `None`.
/// Accepts the `/cmd@botname` form used in group chats.
pub fn parse_command(text: &str) -> Option<Command> {
    let body = text.trim().strip_prefix('/')?;
    let word = body.split_whitespace().next().unwrap_or("");
    let name = word.split('@').next().unwrap_or(word).to_lowercase();

    Some(match name.as_str() {
        "start" | "help" => Command::Help,
        "monitor" => Command::Monitor,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "criteria" => Command::Criteria,
        _ => Command::Unknown(name),
    })
}

fn help_text(max_age_secs: i64) -> String {
    format!(
        "🤖 Token Launch Scout\n\
         \n\
         Commands:\n\
         /monitor - Start monitoring for new tokens\n\
         /stop - Stop monitoring\n\
         /status - Check monitoring status\n\
         /criteria - View filtering criteria\n\
         \n\
         Only tokens active within the last {} are alerted.",
        format_window(max_age_secs)
    )
}

/// Reply text for a command, applying its effect on the controller.
pub async fn respond(controller: &MonitorController, command: &Command) -> String {
    match command {
        Command::Help => {
            let max_age_secs = controller.orchestrator().evaluator().config().max_age_secs;
            help_text(max_age_secs)
        }
        Command::Monitor => match controller.start() {
            StartOutcome::Started => "✅ Started monitoring for new tokens".to_string(),
            StartOutcome::AlreadyActive => "⚠️ Already monitoring!".to_string(),
        },
        Command::Stop => {
            controller.stop();
            "⏹️ Stopped monitoring.".to_string()
        }
        Command::Status => {
            let status = controller.status().await;
            let state = match status.state {
                MonitorState::Active => "🟢 Active",
                MonitorState::Stopped => "🔴 Stopped",
            };
            format!(
                "Status: {state}\nTokens processed: {}",
                status.total_processed
            )
        }
        Command::Criteria => controller.orchestrator().evaluator().describe(),
        Command::Unknown(name) => {
            format!("❓ Unknown command: /{name}\nUse /help for available commands")
        }
    }
}

/// Long-polls the bot for commands from the configured chat.
pub struct CommandListener {
    bot: Arc<TelegramBot>,
    controller: Arc<MonitorController>,
}

impl CommandListener {
    pub fn new(bot: Arc<TelegramBot>, controller: Arc<MonitorController>) -> Self {
        Self { bot, controller }
    }

    /// Poll until the task is aborted.
    pub async fn run(self) {
        info!(chat_id = self.bot.chat_id(), "Starting Telegram command listener");
        let mut offset = 0i64;

        loop {
            match self.bot.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to poll Telegram updates");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        if !is_authorized(message.chat.id, self.bot.chat_id()) {
            debug!(chat_id = message.chat.id, "Ignoring message from unknown chat");
            return;
        }
        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            return;
        };

        info!(command = ?command, "Received command");
        let reply = respond(&self.controller, &command).await;
        if let Err(e) = self.bot.send_message(&reply, None).await {
            warn!(error = %e, "Failed to send Telegram reply");
        }
    }
}

/// Commands are honoured only from the configured chat.
fn is_authorized(chat_id: i64, allowed: &str) -> bool {
    allowed.trim().parse::<i64>().is_ok_and(|allowed| allowed == chat_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
