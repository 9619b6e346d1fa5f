//! Scaling endpoints: batch operations, bulk data, stats, optimization.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::Json;
use haven_db::CLEANUP_THRESHOLD;
use haven_db::TopicStore;
use haven_types::{AgentId, PlayerId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/batch/init`.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchInitRequest {
    /// Agents to bring up.
    #[validate(length(min = 1, max = 500))]
    pub npc_ids: Vec<String>,
}

/// Initialize many agents in one call.
pub async fn batch_init(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchInitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let started = Instant::now();

    let mut results = Vec::with_capacity(request.npc_ids.len());
    let mut initialized = 0;
    let mut errors = 0;
    for npc_id in &request.npc_ids {
        let agent_id = AgentId::from(npc_id.as_str());
        match state.fleet.register(&agent_id, None).await {
            Ok(outcome) => {
                if outcome.status == haven_world::InitStatus::Initialized {
                    initialized += 1;
                }
                results.push(serde_json::json!({
                    "npc_id": agent_id,
                    "status": outcome.status,
                    "role": outcome.role,
                }));
            }
            Err(e) => {
                errors += 1;
                results.push(serde_json::json!({
                    "npc_id": agent_id,
                    "status": "error",
                    "error": e.to_string(),
                }));
            }
        }
    }

    Ok(Json(serde_json::json!({
        "initialized": initialized,
        "errors": errors,
        "results": results,
        "processing_time_ms": started.elapsed().as_millis() as u64,
    })))
}

/// One interaction inside a batch.
#[derive(Debug, Deserialize, Serialize)]
pub struct BatchInteraction {
    /// Target agent.
    pub npc_id: String,
    /// Acting player.
    pub player_id: String,
    /// The action text.
    pub action: String,
}

/// Body of `POST /api/batch/interact`.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchInteractRequest {
    /// Interactions to process, in order.
    #[validate(length(min = 1, max = 100))]
    pub interactions: Vec<BatchInteraction>,
}

/// Process many interactions sequentially; per-item failures do not
/// abort the batch.
pub async fn batch_interact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchInteractRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let started = Instant::now();

    let mut results = Vec::with_capacity(request.interactions.len());
    let mut processed = 0;
    let mut errors = 0;
    for interaction in &request.interactions {
        let agent_id = AgentId::from(interaction.npc_id.as_str());
        let player_id = PlayerId::from(interaction.player_id.as_str());
        let outcome = match state.fleet.handle(&agent_id).await {
            Ok(handle) => handle
                .process_action(&interaction.action, &player_id, None)
                .await
                .map_err(haven_world::WorldError::Agent),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(report) => {
                processed += 1;
                state.fleet.scheduler().touch(&agent_id);
                results.push(serde_json::json!({
                    "npc_id": agent_id,
                    "dialogue": report.cognitive_frame.dialogue,
                    "intent": report.cognitive_frame.intent,
                    "reputation_now": report.reputation_now,
                }));
            }
            Err(e) => {
                errors += 1;
                results.push(serde_json::json!({
                    "npc_id": agent_id,
                    "error": e.to_string(),
                }));
            }
        }
    }

    Ok(Json(serde_json::json!({
        "processed": processed,
        "errors": errors,
        "results": results,
        "processing_time_ms": started.elapsed().as_millis() as u64,
    })))
}

/// Body of `POST /api/bulk/npc_data`.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkDataRequest {
    /// Agents to aggregate.
    #[validate(length(min = 1, max = 500))]
    pub npc_ids: Vec<String>,
}

/// Aggregate memory statistics for many agents in one query.
pub async fn bulk_agent_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkDataRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let ids: Vec<AgentId> = request
        .npc_ids
        .iter()
        .map(|id| AgentId::from(id.as_str()))
        .collect();
    let stats = state.batch.agent_stats(&ids).await?;
    Ok(Json(serde_json::json!({"count": stats.len(), "npcs": stats})))
}

/// System-wide scaling statistics.
pub async fn scaling_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scheduler = state.fleet.scheduler();
    let distribution: serde_json::Map<String, serde_json::Value> = scheduler
        .distribution()
        .into_iter()
        .map(|(tier, count)| (tier.as_str().to_owned(), serde_json::json!(count)))
        .collect();

    Ok(Json(serde_json::json!({
        "status": "operational",
        "active_npcs": scheduler.tracked(),
        "tier_distribution": distribution,
        "stats": {
            "cache": state.cache.stats(),
            "tiers": {
                "tick": scheduler.current_tick(),
                "tracked": scheduler.tracked(),
            },
            "performance": state.perf.report_all(),
        },
    })))
}

/// Cache hit/miss statistics.
pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::to_value(state.cache.stats())
        .map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Query parameters for optimization.
#[derive(Debug, Deserialize)]
pub struct OptimizeQuery {
    /// Cleanup threshold override.
    pub threshold: Option<f64>,
}

/// Run the maintenance sweep: forget faded memories, refresh planner
/// statistics, flush pending batched writes. Converges: a second run on
/// unchanged data is a no-op.
pub async fn optimize(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OptimizeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let started = Instant::now();
    let threshold = query.threshold.unwrap_or(CLEANUP_THRESHOLD);

    let cleaned = TopicStore::new(state.store.pool()).cleanup(threshold).await?;
    state.store.analyze().await?;
    let flushed = state.batch.flush().await?;
    state.cache.invalidate_prefix("agent:");
    state.cache.invalidate_prefix("player:");

    let distribution: serde_json::Map<String, serde_json::Value> = state
        .fleet
        .scheduler()
        .distribution()
        .into_iter()
        .map(|(tier, count)| (tier.as_str().to_owned(), serde_json::json!(count)))
        .collect();

    Ok(Json(serde_json::json!({
        "status": "optimization_complete",
        "memories_cleaned": cleaned.topics_removed + cleaned.shared_removed,
        "writes_flushed": flushed,
        "processing_time_ms": started.elapsed().as_millis() as u64,
        "tier_stats": distribution,
    })))
}
