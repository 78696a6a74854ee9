//! Scan orchestrator.
//!
//! One scan cycle: list candidates, drop those already seen or
//! denylisted, enrich the rest one at a time, evaluate them, and publish
//! accepted tokens to the alert sink in listing order.

use anyhow::{bail, Result};
use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::criteria::CriteriaEvaluator;
use super::market_data::MarketDataClient;
use super::monitor::MonitorSwitch;
use super::seen::SeenStore;
use crate::alerts::AlertSink;
use crate::config::ScannerConfig;
use crate::types::Candidate;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Candidates examined per cycle, from the head of the listing.
    pub scan_depth: usize,
    /// Pause after each publish attempt.
    pub alert_spacing: Duration,
    /// Pause after the listing reports throttling.
    pub throttle_cooldown: Duration,
}

impl ScanSettings {
    /// No pauses. For tests and dry runs against local sources.
    pub fn immediate(scan_depth: usize) -> Self {
        Self {
            scan_depth,
            alert_spacing: Duration::ZERO,
            throttle_cooldown: Duration::ZERO,
        }
    }
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            scan_depth: cfg.scan_depth,
            alert_spacing: Duration::from_millis(cfg.alert_spacing_ms),
            throttle_cooldown: Duration::from_secs(cfg.throttle_cooldown_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Monitoring was stopped; nothing was fetched.
    Inactive,
    /// Listing was rate limited; the cycle cooled down and ended.
    Throttled,
    /// Listing returned no candidates.
    Empty,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub listed: usize,
    pub skipped_seen: usize,
    pub skipped_denylisted: usize,
    pub evaluated: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub alerts_failed: usize,
    pub candidate_errors: usize,
    pub total_processed: usize,
}

impl ScanReport {
    fn new(status: ScanStatus) -> Self {
        Self {
            status,
            listed: 0,
            skipped_seen: 0,
            skipped_denylisted: 0,
            evaluated: 0,
            accepted: 0,
            rejected: 0,
            alerts_failed: 0,
            candidate_errors: 0,
            total_processed: 0,
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::AlreadySeen => self.skipped_seen += 1,
            Outcome::Denylisted => self.skipped_denylisted += 1,
            Outcome::Rejected => {
                self.evaluated += 1;
                self.rejected += 1;
            }
            Outcome::Alerted => {
                self.evaluated += 1;
                self.accepted += 1;
            }
            Outcome::AlertFailed => {
                self.evaluated += 1;
                self.accepted += 1;
                self.alerts_failed += 1;
            }
        }
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    AlreadySeen,
    Denylisted,
    Rejected,
    Alerted,
    AlertFailed,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ScanOrchestrator {
    client: MarketDataClient,
    evaluator: CriteriaEvaluator,
    sink: Arc<dyn AlertSink>,
    seen: Arc<Mutex<SeenStore>>,
    switch: MonitorSwitch,
    settings: ScanSettings,
    /// Held for the whole cycle so scans never interleave.
    scan_lock: Mutex<()>,
}

impl ScanOrchestrator {
    pub fn new(
        client: MarketDataClient,
        evaluator: CriteriaEvaluator,
        sink: Arc<dyn AlertSink>,
        switch: MonitorSwitch,
        settings: ScanSettings,
    ) -> Self {
        Self::with_seen(
            client,
            evaluator,
            sink,
            switch,
            settings,
            Arc::new(Mutex::new(SeenStore::new())),
        )
    }

    pub fn with_seen(
        client: MarketDataClient,
        evaluator: CriteriaEvaluator,
        sink: Arc<dyn AlertSink>,
        switch: MonitorSwitch,
        settings: ScanSettings,
        seen: Arc<Mutex<SeenStore>>,
    ) -> Self {
        Self {
            client,
            evaluator,
            sink,
            seen,
            switch,
            settings,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn switch(&self) -> &MonitorSwitch {
        &self.switch
    }

    pub fn evaluator(&self) -> &CriteriaEvaluator {
        &self.evaluator
    }

    pub fn seen(&self) -> &Arc<Mutex<SeenStore>> {
        &self.seen
    }

    pub async fn total_processed(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Run one scan cycle. A no-op unless monitoring is active.
    pub async fn run_scan(&self) -> ScanReport {
        let _guard = self.scan_lock.lock().await;
        if !self.switch.is_active() {
            debug!("Monitoring inactive, skipping scan");
            return ScanReport::new(ScanStatus::Inactive);
        }

        let span = info_span!("scan", scan_id = %Uuid::new_v4());
        self.scan_cycle().instrument(span).await
    }

    async fn scan_cycle(&self) -> ScanReport {
        info!("Starting new scan");

        let discovery = self.client.list_candidates().await;
        if discovery.throttled {
            warn!(
                cooldown_secs = self.settings.throttle_cooldown.as_secs(),
                "Rate limited, cooling down before next scan"
            );
            tokio::time::sleep(self.settings.throttle_cooldown).await;
            return ScanReport::new(ScanStatus::Throttled);
        }
        if discovery.candidates.is_empty() {
            info!("No candidates listed, skipping scan");
            return ScanReport::new(ScanStatus::Empty);
        }

        let mut report = ScanReport::new(ScanStatus::Completed);
        let candidates: Vec<Candidate> = discovery
            .candidates
            .into_iter()
            .take(self.settings.scan_depth)
            .collect();
        report.listed = candidates.len();

        for (idx, candidate) in candidates.iter().enumerate() {
            let processing = self.process_candidate(candidate, idx + 1, report.listed);
            let processed = AssertUnwindSafe(processing).catch_unwind().await;
            let error = match processed {
                Ok(Ok(outcome)) => {
                    report.record(outcome);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            report.candidate_errors += 1;
            warn!(candidate = %candidate, error = %error, "Candidate processing failed");
            if !candidate.address.trim().is_empty() {
                self.seen.lock().await.mark(&candidate.address);
            }
        }

        report.total_processed = self.total_processed().await;
        info!(
            checked = report.evaluated,
            found = report.accepted,
            skipped_seen = report.skipped_seen,
            skipped_denylisted = report.skipped_denylisted,
            errors = report.candidate_errors,
            total_processed = report.total_processed,
            "Scan complete"
        );
        report
    }

    async fn process_candidate(
        &self,
        candidate: &Candidate,
        position: usize,
        total: usize,
    ) -> Result<Outcome> {
        let address = candidate.address.as_str();
        if address.trim().is_empty() {
            bail!("candidate has no address");
        }

        if self.seen.lock().await.has(address) {
            debug!(address, "Already processed, skipping");
            return Ok(Outcome::AlreadySeen);
        }

        if self.evaluator.is_denylisted(candidate.symbol.as_deref()) {
            info!(
                address,
                symbol = candidate.symbol_or_placeholder(),
                "Skipping established token"
            );
            self.seen.lock().await.mark(address);
            return Ok(Outcome::Denylisted);
        }

        info!(position, total, candidate = %candidate, "Analyzing candidate");
        let (overview, security) = self.client.enrich(address).await;
        let verdict = self
            .evaluator
            .evaluate(candidate, &overview, &security, Utc::now());
        self.seen.lock().await.mark(address);

        if !verdict.accepted {
            return Ok(Outcome::Rejected);
        }

        info!(candidate = %candidate, "New token passed all checks, publishing alert");
        let published = self.sink.publish(candidate, &overview, &security).await;
        tokio::time::sleep(self.settings.alert_spacing).await;

        match published {
            Ok(()) => Ok(Outcome::Alerted),
            Err(e) => {
                warn!(address, error = %e, "Failed to publish alert");
                Ok(Outcome::AlertFailed)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
