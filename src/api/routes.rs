//! Control API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::criteria::CriteriaConfig;
use crate::engine::monitor::{MonitorController, MonitorState, MonitorStatus, StartOutcome};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ApiState {
    pub controller: Arc<MonitorController>,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(controller: Arc<MonitorController>) -> Self {
        Self {
            controller,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub started: bool,
    pub state: MonitorState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    /// False when monitoring was already stopped.
    pub stopped: bool,
    pub state: MonitorState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaResponse {
    pub summary: String,
    pub thresholds: CriteriaConfig,
    pub denylist_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.controller.status().await)
}

/// POST /api/monitor/start
pub async fn start_monitor(State(state): State<AppState>) -> Json<StartResponse> {
    let outcome = state.controller.start();
    Json(StartResponse {
        started: outcome == StartOutcome::Started,
        state: state.controller.state(),
    })
}

/// POST /api/monitor/stop
pub async fn stop_monitor(State(state): State<AppState>) -> Json<StopResponse> {
    let stopped = state.controller.stop();
    Json(StopResponse {
        stopped,
        state: state.controller.state(),
    })
}

/// GET /api/criteria
pub async fn get_criteria(State(state): State<AppState>) -> Json<CriteriaResponse> {
    let evaluator = state.controller.orchestrator().evaluator();
    Json(CriteriaResponse {
        summary: evaluator.describe(),
        thresholds: evaluator.config().clone(),
        denylist_size: evaluator.denylist_len(),
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            uptime_secs: uptime,
        }),
    )
}
