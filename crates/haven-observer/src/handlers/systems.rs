//! Quest, economy and territory endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use haven_db::{EconomyStore, PlayerStore, QuestStore};
use haven_types::{
    AgentId, BattleId, ChainId, PlayerId, QuestId, QuestStatus, RouteId, RouteStatus, TerritoryId,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

/// Generate a quest offered by an agent.
pub async fn generate_quest(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let giver = AgentId::from(npc_id.as_str());
    let quest = haven_world::generate_quest(&state.fleet, &giver, None).await?;
    Ok(Json(serde_json::json!({"status": "quest_generated", "quest": quest})))
}

/// Body of `POST /api/quest/{id}/accept`.
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    /// The accepting player.
    pub player_id: String,
}

/// Accept an available quest.
pub async fn accept_quest(
    State(state): State<Arc<AppState>>,
    Path(quest_id): Path<String>,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.player_id.is_empty() {
        return Err(ApiError::InvalidArgument("player_id is required".to_owned()));
    }
    let quest_id: QuestId = parse_id(&quest_id)?;
    let player = PlayerId::from(request.player_id.as_str());
    PlayerStore::new(state.store.pool())
        .ensure_player(&player, None)
        .await?;
    let quest = QuestStore::new(state.store.pool())
        .accept(quest_id, &player)
        .await?;
    Ok(Json(serde_json::json!({"status": "quest_accepted", "quest": quest})))
}

/// Complete an active quest and credit its rewards.
pub async fn complete_quest(
    State(state): State<Arc<AppState>>,
    Path(quest_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let quest_id: QuestId = parse_id(&quest_id)?;
    let quest = QuestStore::new(state.store.pool()).complete(quest_id).await?;

    // Reputation reward lands on the (player, giver) edge.
    if let Some(player_id) = quest.player_id.as_deref()
        && quest.reward_reputation != 0.0
    {
        PlayerStore::new(state.store.pool())
            .update_reputation(
                &PlayerId::from(player_id),
                &quest.giver_agent,
                quest.reward_reputation,
            )
            .await?;
    }

    Ok(Json(serde_json::json!({
        "status": "quest_completed",
        "quest": quest,
        "rewards": {
            "gold": quest.reward_gold,
            "reputation": quest.reward_reputation,
            "item": quest.reward_item,
        },
    })))
}

/// Query parameters for quest listings.
#[derive(Debug, Deserialize)]
pub struct QuestQuery {
    /// Optional status filter.
    pub status: Option<String>,
    /// Optional giver filter.
    pub npc_id: Option<String>,
    /// Optional player filter.
    pub player_id: Option<String>,
}

/// List quests with optional filters.
pub async fn list_quests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            QuestStatus::parse(raw)
                .ok_or_else(|| ApiError::InvalidArgument(format!("unknown quest status: {raw}")))?,
        ),
        None => None,
    };
    let giver = query.npc_id.map(|id| AgentId::from(id.as_str()));
    let player = query.player_id.map(|id| PlayerId::from(id.as_str()));

    let quests = QuestStore::new(state.store.pool())
        .list_quests(status, giver.as_ref(), player.as_ref())
        .await?;
    Ok(Json(serde_json::json!({"total": quests.len(), "quests": quests})))
}

/// Paginated quest listing.
pub async fn list_quests_paginated(
    State(state): State<Arc<AppState>>,
    Query(query): Query<super::agents::PaginationQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);
    let (quests, total) = QuestStore::new(state.store.pool())
        .paginated_quests(page, page_size)
        .await?;
    Ok(Json(serde_json::json!({
        "page": page,
        "page_size": page_size,
        "total": total,
        "total_pages": (total as usize).div_ceil(page_size as usize).max(1),
        "quests": quests,
    })))
}

// ---------------------------------------------------------------------------
// Quest chains
// ---------------------------------------------------------------------------

/// Create a quest chain for an agent.
pub async fn create_chain(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = AgentId::from(npc_id.as_str());
    let chain = haven_world::generate_chain(&state.fleet, &agent).await?;
    Ok(Json(serde_json::json!({"status": "chain_created", "chain": chain})))
}

/// List all quest chains.
pub async fn list_chains(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chains = QuestStore::new(state.store.pool()).list_chains().await?;
    Ok(Json(serde_json::json!({"total": chains.len(), "chains": chains})))
}

/// Fetch one quest chain.
pub async fn get_chain(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chain_id: ChainId = parse_id(&chain_id)?;
    let chain = QuestStore::new(state.store.pool()).get_chain(chain_id).await?;
    Ok(Json(serde_json::json!({"chain": chain})))
}

/// Start a quest chain.
pub async fn start_chain(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chain_id: ChainId = parse_id(&chain_id)?;
    let chain = QuestStore::new(state.store.pool()).start_chain(chain_id).await?;
    Ok(Json(serde_json::json!({"status": "chain_started", "chain": chain})))
}

/// Advance a quest chain's cursor.
pub async fn advance_chain(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chain_id: ChainId = parse_id(&chain_id)?;
    let chain = QuestStore::new(state.store.pool()).advance_chain(chain_id).await?;
    Ok(Json(serde_json::json!({"status": "chain_advanced", "chain": chain})))
}

/// Query parameter for goal generation.
#[derive(Debug, Deserialize)]
pub struct GoalGenQuery {
    /// Optional faction context.
    pub faction: Option<String>,
}

/// Generate a goal for an agent.
pub async fn generate_goal(
    State(state): State<Arc<AppState>>,
    Path(npc_id): Path<String>,
    Query(query): Query<GoalGenQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = AgentId::from(npc_id.as_str());
    let goal = haven_world::generate_goal(&state.fleet, &agent, query.faction.as_deref()).await?;
    Ok(Json(serde_json::json!({"status": "goal_generated", "goal": goal})))
}

// ---------------------------------------------------------------------------
// Trade routes
// ---------------------------------------------------------------------------

/// Body of `POST /api/traderoute/establish`.
#[derive(Debug, Deserialize)]
pub struct EstablishRequest {
    /// Selling agent.
    pub from_npc: String,
    /// Buying agent.
    pub to_npc: String,
}

/// Establish a trade route between two agents.
pub async fn establish_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EstablishRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.from_npc.is_empty() || request.to_npc.is_empty() {
        return Err(ApiError::InvalidArgument(
            "from_npc and to_npc are required".to_owned(),
        ));
    }
    let route = haven_world::establish_route(
        &state.fleet,
        &AgentId::from(request.from_npc.as_str()),
        &AgentId::from(request.to_npc.as_str()),
    )
    .await?;
    Ok(Json(serde_json::json!({"status": "route_established", "route": route})))
}

/// Query parameters for the route listing.
#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    /// Optional status filter.
    pub status: Option<String>,
}

/// List trade routes.
pub async fn list_routes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            RouteStatus::parse(raw)
                .ok_or_else(|| ApiError::InvalidArgument(format!("unknown route status: {raw}")))?,
        ),
        None => None,
    };
    let routes = EconomyStore::new(state.store.pool()).list_routes(status).await?;
    Ok(Json(serde_json::json!({"total": routes.len(), "routes": routes})))
}

/// Execute one trade along a route.
pub async fn execute_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let route_id: RouteId = parse_id(&route_id)?;
    let outcome = haven_world::execute_route(&state.fleet, route_id).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Disrupt a trade route.
pub async fn disrupt_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let route_id: RouteId = parse_id(&route_id)?;
    let route = EconomyStore::new(state.store.pool()).disrupt_route(route_id).await?;
    Ok(Json(serde_json::json!({"status": "route_disrupted", "route": route})))
}

/// Restore a disrupted trade route.
pub async fn restore_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let route_id: RouteId = parse_id(&route_id)?;
    let route = EconomyStore::new(state.store.pool()).restore_route(route_id).await?;
    Ok(Json(serde_json::json!({"status": "route_restored", "route": route})))
}

// ---------------------------------------------------------------------------
// Territory and battles
// ---------------------------------------------------------------------------

/// All territories with their control state.
pub async fn territory_control(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let territories = EconomyStore::new(state.store.pool()).territory_control().await?;
    let map: serde_json::Map<String, serde_json::Value> = territories
        .into_iter()
        .map(|t| {
            (
                t.id.to_string(),
                serde_json::json!({
                    "name": t.name,
                    "controlling_faction": t.controlling_faction,
                    "control_strength": t.control_strength,
                    "strategic_value": t.strategic_value,
                }),
            )
        })
        .collect();
    Ok(Json(serde_json::json!({"territories": map})))
}

/// Body of `POST /api/territory/{id}/battle`.
#[derive(Debug, Deserialize)]
pub struct BattleRequest {
    /// The faction launching the attack.
    pub attacker_faction: String,
}

/// Initiate a battle for a territory.
pub async fn initiate_battle(
    State(state): State<Arc<AppState>>,
    Path(territory_id): Path<String>,
    Json(request): Json<BattleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.attacker_faction.is_empty() {
        return Err(ApiError::InvalidArgument("attacker_faction is required".to_owned()));
    }
    let territory_id: TerritoryId = parse_id(&territory_id)?;
    let battle =
        haven_world::initiate_battle(&state.fleet, territory_id, &request.attacker_faction).await?;
    Ok(Json(serde_json::json!({"status": "battle_initiated", "battle": battle})))
}

/// Resolve an in-progress battle.
pub async fn resolve_battle(
    State(state): State<Arc<AppState>>,
    Path(battle_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let battle_id: BattleId = parse_id(&battle_id)?;
    let battle = haven_world::resolve_battle(&state.fleet, battle_id).await?;
    Ok(Json(serde_json::json!({
        "battle_id": battle.id,
        "status": battle.status,
        "winner": battle.winner,
        "battle": battle,
    })))
}

/// Battle history.
pub async fn list_battles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let battles = EconomyStore::new(state.store.pool()).list_battles().await?;
    Ok(Json(serde_json::json!({"total": battles.len(), "battles": battles})))
}
