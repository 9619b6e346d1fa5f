//! World simulation control endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/world/start`.
#[derive(Debug, Deserialize, Validate)]
pub struct StartRequest {
    /// Simulated seconds per wall second (default 60).
    #[validate(range(min = 0.0, max = 100_000.0))]
    pub time_scale: Option<f64>,
    /// Wall seconds between ticks (default 60).
    #[validate(range(min = 0.1, max = 3600.0))]
    pub tick_interval_secs: Option<f64>,
}

/// Start (or retune) the world tick loop.
pub async fn start_world(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let time_scale = request.time_scale.unwrap_or(60.0);
    let interval = Duration::from_secs_f64(request.tick_interval_secs.unwrap_or(60.0));
    state.world.start(time_scale, interval).await;
    Ok(Json(serde_json::json!({"status": "started"})))
}

/// Stop the world tick loop.
pub async fn stop_world(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.world.stop().await;
    Ok(Json(serde_json::json!({"status": "stopped"})))
}

/// Current world status.
pub async fn world_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.world.status().await;
    Ok(Json(serde_json::to_value(status).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Run one world tick immediately.
pub async fn manual_tick(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state.world.tick().await?;
    Ok(Json(serde_json::to_value(report).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Body of `POST /api/world/advance`.
#[derive(Debug, Deserialize, Validate)]
pub struct AdvanceRequest {
    /// Simulated hours to fast-forward.
    #[validate(range(min = 0.0, max = 1_000_000.0))]
    pub hours: f64,
}

/// Deterministic fast-forward over decay, cleanup, expiration, goal
/// progress, gossip and trade.
pub async fn advance_world(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let report = state.world.advance(request.hours).await?;
    Ok(Json(serde_json::to_value(report).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Query parameters for the event listing.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum events to return (default 10, cap 50).
    pub limit: Option<usize>,
}

/// The most recent world events from the bounded ring.
pub async fn world_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let events = state.events.recent(query.limit.unwrap_or(10).min(50));
    Ok(Json(serde_json::json!({"count": events.len(), "events": events})))
}
