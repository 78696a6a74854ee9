//! Monitoring state machine: `Stopped ⇄ Active`.
//!
//! `MonitorSwitch` is the shared state object the scanner consults before
//! each cycle. `MonitorController` owns the periodic timer that drives
//! `ScanOrchestrator::run_scan` while the switch is active.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::scanner::{ScanOrchestrator, ScanReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Stopped,
    Active,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Stopped => "stopped",
            MonitorState::Active => "active",
        }
    }
}

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

/// Active flag plus start generation, packed into one atomic word:
/// bit 0 is the active flag, the remaining bits count activations.
///
/// A timer armed by activation `g` keeps running only while the word
/// equals `(g << 1) | 1`, so a stop followed by a fast restart cancels
/// the old timer even though the flag is set again.
#[derive(Debug, Clone, Default)]
pub struct MonitorSwitch {
    word: Arc<AtomicU64>,
}

impl MonitorSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MonitorState {
        if self.is_active() {
            MonitorState::Active
        } else {
            MonitorState::Stopped
        }
    }

    pub fn is_active(&self) -> bool {
        self.word.load(Ordering::SeqCst) & 1 == 1
    }

    /// Transition to Active. Returns the new generation, or `None` if the
    /// switch was already active.
    pub fn activate(&self) -> Option<u64> {
        let mut current = self.word.load(Ordering::SeqCst);
        loop {
            if current & 1 == 1 {
                return None;
            }
            let generation = (current >> 1) + 1;
            let next = (generation << 1) | 1;
            match self
                .word
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Some(generation),
                Err(actual) => current = actual,
            }
        }
    }

    /// Transition to Stopped. Returns whether the switch was active.
    pub fn deactivate(&self) -> bool {
        self.word.fetch_and(!1, Ordering::SeqCst) & 1 == 1
    }

    /// True while activation `generation` is still the live one.
    pub fn is_current(&self, generation: u64) -> bool {
        self.word.load(Ordering::SeqCst) == (generation << 1) | 1
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub total_processed: usize,
}

pub struct MonitorController {
    switch: MonitorSwitch,
    orchestrator: Arc<ScanOrchestrator>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorController {
    /// The controller drives the switch the orchestrator was built with.
    pub fn new(orchestrator: Arc<ScanOrchestrator>, interval: Duration) -> Self {
        Self {
            switch: orchestrator.switch().clone(),
            orchestrator,
            interval: interval.max(Duration::from_millis(1)),
            timer: Mutex::new(None),
        }
    }

    /// Begin monitoring: one scan immediately, then one per interval.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> StartOutcome {
        let Some(generation) = self.switch.activate() else {
            info!("Start requested but monitoring is already active");
            return StartOutcome::AlreadyActive;
        };

        info!(
            generation,
            interval_secs = self.interval.as_secs(),
            "Monitoring started"
        );
        let handle = tokio::spawn(run_timer(
            self.switch.clone(),
            self.orchestrator.clone(),
            self.interval,
            generation,
        ));

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        // A previous timer exits on its next tick; dropping its handle detaches it.
        *timer = Some(handle);
        StartOutcome::Started
    }

    /// Suppress future ticks. A scan already running finishes normally.
    pub fn stop(&self) -> bool {
        let was_active = self.switch.deactivate();
        if was_active {
            info!("Monitoring stopped");
        } else {
            debug!("Stop requested but monitoring is not active");
        }
        was_active
    }

    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            state: self.switch.state(),
            total_processed: self.orchestrator.total_processed().await,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.switch.state()
    }

    pub fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
        &self.orchestrator
    }

    /// Stop and abort the timer task. Aborting the timer also aborts the
    /// scan cycle it is awaiting. Used on process shutdown only.
    pub fn shutdown(&self) {
        self.stop();
        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}

async fn run_timer(
    switch: MonitorSwitch,
    orchestrator: Arc<ScanOrchestrator>,
    interval: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately.
        ticker.tick().await;
        if !switch.is_current(generation) {
            info!(generation, "Monitoring timer cancelled");
            break;
        }

        // Each cycle runs as its own task so a panic aborts only that cycle.
        let cycle = orchestrator.clone();
        let mut running = CycleTask(tokio::spawn(async move { cycle.run_scan().await }));
        match (&mut running.0).await {
            Ok(report) => debug!(status = ?report.status, "Scan cycle finished"),
            Err(e) if e.is_panic() => error!(error = %e, "Scan cycle panicked"),
            Err(e) => error!(error = %e, "Scan cycle aborted"),
        }
    }
}

/// A spawned scan cycle that is aborted if its timer is dropped mid-scan.
struct CycleTask(JoinHandle<ScanReport>);

impl Drop for CycleTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
