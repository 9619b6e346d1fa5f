//! Agent lifecycle, interaction and state endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use haven_db::{MemoryVault, QuestStore, RelationStore, TopicStore};
use haven_types::{AgentId, GoalStatus, PlayerId, UpdateTier};
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/npc/init`.
#[derive(Debug, Deserialize, Validate)]
pub struct InitRequest {
    /// The agent to bring up.
    #[validate(length(min = 1, max = 64))]
    pub npc_id: String,
    /// Optional faction override (defaults to the persona's faction).
    pub faction: Option<String>,
}

/// Initialize an agent: resolve its persona and spawn its worker.
pub async fn init_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let agent_id = AgentId::from(request.npc_id.as_str());
    let outcome = state
        .fleet
        .register(&agent_id, request.faction.as_deref())
        .await?;
    Ok(Json(serde_json::json!({
        "npc_id": agent_id,
        "status": outcome.status,
        "role": outcome.role,
        "location": outcome.location,
    })))
}

/// Shut an agent down and remove it from the fleet.
pub async fn shutdown_agent(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    state.fleet.unregister(&agent_id).await?;
    state.cache.invalidate_prefix(&format!("agent:{agent_id}:"));
    Ok(Json(serde_json::json!({"npc_id": agent_id, "status": "stopped"})))
}

/// List all registered agents.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agents = state.fleet.list().await;
    Ok(Json(serde_json::json!({"count": agents.len(), "npcs": agents})))
}

/// Query parameters for the paginated agent listing.
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size (1..=100).
    pub page_size: Option<u32>,
    /// Optional tier filter.
    pub tier: Option<String>,
}

/// Paginated agent listing with an optional tier filter.
pub async fn list_agents_paginated(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);
    let tier_filter = match query.tier.as_deref() {
        Some(raw) => Some(
            UpdateTier::parse(raw)
                .ok_or_else(|| ApiError::InvalidArgument(format!("unknown tier: {raw}")))?,
        ),
        None => None,
    };

    let mut agents = state.fleet.list().await;
    if let Some(tier) = tier_filter {
        let scheduler = state.fleet.scheduler();
        agents.retain(|entry| scheduler.tier_of(&entry.id) == Some(tier));
    }

    let total = agents.len();
    let total_pages = total.div_ceil(page_size as usize).max(1);
    let start = ((page - 1) as usize * page_size as usize).min(total);
    let end = (start + page_size as usize).min(total);
    let page_items = &agents[start..end];

    Ok(Json(serde_json::json!({
        "page": page,
        "page_size": page_size,
        "total": total,
        "total_pages": total_pages,
        "npcs": page_items,
    })))
}

/// Body of `POST /api/npc/{id}/action`.
#[derive(Debug, Deserialize, Validate)]
pub struct ActionRequest {
    /// What the player did or said.
    #[validate(length(min = 1, max = 2000))]
    pub action: String,
    /// The acting player.
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    /// Optional display name.
    pub player_name: Option<String>,
}

/// Run one reactive cycle for a player action, then opportunistically
/// share topics about that player with the agent's closest confidant.
pub async fn agent_action(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let _timer = state.perf.start_timer("npc_action");

    let agent_id = AgentId::from(npc_id.as_str());
    let player_id = PlayerId::from(request.player_id.as_str());

    let handle = state.fleet.handle(&agent_id).await?;
    state.fleet.scheduler().touch(&agent_id);

    let mut report = handle
        .process_action(&request.action, &player_id, request.player_name.as_deref())
        .await?;

    // Opportunistic sharing with the most trusted peer (relation-gated
    // inside the gossip module).
    let relations = RelationStore::new(state.store.pool())
        .relations_of(&agent_id)
        .await?;
    if let Some(best) = relations.first() {
        match haven_world::share_memories(&state.fleet, &agent_id, &best.agent_b, Some(&player_id))
            .await
        {
            Ok(shared) => report.memories_shared = shared,
            Err(e) => tracing::debug!(error = %e, "opportunistic share skipped"),
        }
    }

    state.cache.invalidate_prefix(&format!("agent:{agent_id}:"));
    state.cache.invalidate_prefix(&format!("player:{player_id}:"));

    Ok(Json(serde_json::to_value(&report).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Current vitals, emotional state and personality of an agent.
pub async fn agent_status(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());

    let cache_key = format!("agent:{agent_id}:status");
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let handle = state.fleet.handle(&agent_id).await?;
    let snapshot = handle.status().await?;
    let tier = state.fleet.scheduler().tier_of(&agent_id);

    let body = serde_json::json!({
        "npc_id": snapshot.agent_id,
        "persona": snapshot.persona,
        "personality": snapshot.personality,
        "vitals": snapshot.limbic.vitals,
        "emotional_state": snapshot.limbic.emotional_state,
        "think_time": snapshot.limbic.think_time,
        "tier": tier,
    });
    state.cache.set(cache_key, body.clone());
    Ok(Json(body))
}

/// Query parameter for list limits.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    /// Maximum rows to return.
    pub limit: Option<u32>,
}

/// Recent memories of an agent.
pub async fn agent_memories(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    state.fleet.handle(&agent_id).await?;
    let memories = MemoryVault::new(state.store.pool())
        .recent_memories(&agent_id, query.limit.unwrap_or(10).min(100))
        .await?;
    Ok(Json(serde_json::json!({"npc_id": agent_id, "memories": memories})))
}

/// Top-strength beliefs of an agent.
pub async fn agent_beliefs(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    state.fleet.handle(&agent_id).await?;
    let beliefs = MemoryVault::new(state.store.pool())
        .top_beliefs(&agent_id, query.limit.unwrap_or(10).min(100))
        .await?;
    Ok(Json(serde_json::json!({"npc_id": agent_id, "beliefs": beliefs})))
}

/// Relations of an agent, symmetric view with derived labels.
pub async fn agent_relationships(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    state.fleet.handle(&agent_id).await?;
    let relations = RelationStore::new(state.store.pool())
        .relations_of(&agent_id)
        .await?;
    Ok(Json(serde_json::json!({"npc_id": agent_id, "relationships": relations})))
}

/// Query parameter for goal filtering.
#[derive(Debug, Deserialize)]
pub struct GoalQuery {
    /// Optional status filter.
    pub status: Option<String>,
}

/// Goals of an agent, optionally filtered by status.
pub async fn agent_goals(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
    Query(query): Query<GoalQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    state.fleet.handle(&agent_id).await?;
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            GoalStatus::parse(raw)
                .ok_or_else(|| ApiError::InvalidArgument(format!("unknown goal status: {raw}")))?,
        ),
        None => None,
    };
    let goals = QuestStore::new(state.store.pool())
        .goals_for(&agent_id, status)
        .await?;
    Ok(Json(serde_json::json!({"npc_id": agent_id, "goals": goals})))
}

/// What an agent remembers about a specific player: direct topics plus
/// shared memories.
pub async fn agent_player_memory(
    State(state): State<Arc<AppState>>,
    Path((npc_id, player_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    let player_id = PlayerId::from(player_id.as_str());
    state.fleet.handle(&agent_id).await?;

    let topics = TopicStore::new(state.store.pool());
    let direct = topics.topics_for(&agent_id, &player_id).await?;
    let shared = topics.shared_about(&agent_id, &player_id).await?;
    Ok(Json(serde_json::json!({
        "npc_id": agent_id,
        "player_id": player_id,
        "direct_topics": direct,
        "shared_memories": shared,
    })))
}
