//! Player, reputation, rumor and inter-agent social endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use haven_db::{PlayerStore, RumorStore, TopicStore};
use haven_types::{AgentId, PlayerId};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::agents::PaginationQuery;
use crate::state::AppState;

/// Session, reputation edges, rumors and topic counts for one player.
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let player_id = PlayerId::from(player_id.as_str());
    let pool = state.store.pool();

    let session = PlayerStore::new(pool).get_player(&player_id).await?;
    let edges = PlayerStore::new(pool).edges_for(&player_id).await?;
    let rumors = RumorStore::new(pool).rumors_about(&player_id).await?;
    let recent_actions = PlayerStore::new(pool).action_history(&player_id, 10).await?;

    Ok(Json(serde_json::json!({
        "player": session,
        "reputation_edges": edges,
        "rumors": rumors,
        "recent_actions": recent_actions,
    })))
}

/// Paginated player listing.
pub async fn list_players(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).clamp(1, 100);
    let (players, total) = PlayerStore::new(state.store.pool())
        .list_players(page, page_size)
        .await?;
    Ok(Json(serde_json::json!({
        "page": page,
        "page_size": page_size,
        "total": total,
        "total_pages": (total as usize).div_ceil(page_size as usize).max(1),
        "players": players,
    })))
}

/// Query parameter for explicit memory sharing.
#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    /// Restrict sharing to topics about one player.
    pub player_id: Option<String>,
}

/// Share topics from one agent to another.
pub async fn share_memories(
    State(state): State<Arc<AppState>>,
    Path((from, to)): Path<(String, String)>,
    Query(query): Query<ShareQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = AgentId::from(from.as_str());
    let to = AgentId::from(to.as_str());
    let player = query.player_id.map(|p| PlayerId::from(p.as_str()));

    let shared = haven_world::share_memories(&state.fleet, &from, &to, player.as_ref()).await?;
    Ok(Json(serde_json::json!({
        "from": from,
        "to": to,
        "memories_shared": shared,
    })))
}

/// Run one gossip exchange between two agents.
pub async fn gossip(
    State(state): State<Arc<AppState>>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = AgentId::from(from.as_str());
    let to = AgentId::from(to.as_str());
    let report = haven_world::gossip(&state.fleet, &from, &to).await?;
    Ok(Json(serde_json::json!({
        "from": from,
        "to": to,
        "rumors_shared": report.rumors_shared,
        "memories_shared": report.memories_shared,
        "relationship_improved": report.relationship_improved,
    })))
}

/// Rumors an agent has heard about a player.
pub async fn heard_rumors(
    State(state): State<Arc<AppState>>,
    Path((npc_id, player_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent_id = AgentId::from(npc_id.as_str());
    let player_id = PlayerId::from(player_id.as_str());
    state.fleet.handle(&agent_id).await?;
    let heard = RumorStore::new(state.store.pool())
        .heard_by(&agent_id, &player_id)
        .await?;
    Ok(Json(serde_json::json!({
        "npc_id": agent_id,
        "player_id": player_id,
        "rumors": heard,
    })))
}

/// Direct and shared topic snapshot about a player across all agents
/// the player has talked to -- the social surface's memory view.
pub async fn player_topics(
    State(state): State<Arc<AppState>>,
    Path((player_id, npc_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let player_id = PlayerId::from(player_id.as_str());
    let agent_id = AgentId::from(npc_id.as_str());
    let topics = TopicStore::new(state.store.pool());
    let direct = topics.topics_for(&agent_id, &player_id).await?;
    Ok(Json(serde_json::json!({
        "player_id": player_id,
        "npc_id": agent_id,
        "topics": direct,
    })))
}

/// Faction membership and internal trust summary.
pub async fn factions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.fleet.faction_status().await?;
    Ok(Json(status))
}

/// Relation score and label between two factions.
pub async fn faction_relation(
    State(state): State<Arc<AppState>>,
    Path((faction_a, faction_b)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (score, label) = state.fleet.faction_relation(&faction_a, &faction_b).await;
    Ok(Json(serde_json::json!({
        "faction1": faction_a,
        "faction2": faction_b,
        "score": score,
        "type": label,
    })))
}

/// Body of `POST /api/faction/event`.
#[derive(Debug, Deserialize)]
pub struct FactionEventRequest {
    /// Event kind ("skirmish", "alliance", ...).
    pub event_type: String,
    /// First faction.
    pub faction1: String,
    /// Second faction.
    pub faction2: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Trigger a faction event manually.
pub async fn faction_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FactionEventRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.event_type.is_empty() {
        return Err(ApiError::InvalidArgument("event_type is required".to_owned()));
    }
    let relation = state
        .fleet
        .record_faction_event(
            &request.event_type,
            &request.faction1,
            &request.faction2,
            &request.description,
        )
        .await;
    Ok(Json(serde_json::json!({
        "status": "event_triggered",
        "event_type": request.event_type,
        "relation": relation,
    })))
}
