use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::session::SessionInfo;
use crate::core::telemetry::{SessionCost, TelemetrySummary};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Health check handler
/// Returns a simple JSON response indicating the server is running
pub async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "OK"
    })))
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub count: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Live sessions with their state and turn counter
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionList> {
    let sessions = state.sessions.snapshot();
    Json(SessionList {
        count: sessions.len(),
        sessions,
    })
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub info: SessionInfo,
    /// Costs recorded for this session so far
    pub costs: Option<SessionCost>,
}

/// One live session, with its recorded costs
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionDetail>> {
    let status = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    Ok(Json(SessionDetail {
        info: status.info(),
        costs: state.telemetry.session_summary(&session_id),
    }))
}

/// Per-stage cost aggregates and totals
pub async fn telemetry_summary(State(state): State<Arc<AppState>>) -> Json<TelemetrySummary> {
    Json(state.telemetry.summary())
}
