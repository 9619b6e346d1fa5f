//! Location and conversation-group endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use haven_groups::EntityLocation;
use haven_types::{AgentId, GroupId, PlayerId};
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

/// Body of `POST /api/location/update`.
#[derive(Debug, Deserialize, Validate)]
pub struct LocationUpdateRequest {
    /// "npc" or "player".
    pub entity_type: String,
    /// Which entity moved.
    #[validate(length(min = 1, max = 64))]
    pub entity_id: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Zone label.
    #[serde(default)]
    pub zone: String,
}

/// Record a position update from the game engine.
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocationUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let location = EntityLocation {
        x: request.x,
        y: request.y,
        z: request.z,
    };
    let zone = if request.zone.is_empty() {
        "unknown"
    } else {
        request.zone.as_str()
    };

    match request.entity_type.as_str() {
        "npc" => state.groups.locations().update_agent(
            AgentId::from(request.entity_id.as_str()),
            location,
            zone,
        ),
        "player" => state.groups.locations().update_player(
            PlayerId::from(request.entity_id.as_str()),
            location,
            zone,
        ),
        other => {
            return Err(ApiError::InvalidArgument(format!(
                "entity_type must be npc or player, got {other}"
            )));
        }
    }

    Ok(Json(serde_json::json!({
        "status": "location_updated",
        "entity_type": request.entity_type,
        "entity_id": request.entity_id,
        "location": {"x": request.x, "y": request.y, "z": request.z, "zone": zone},
    })))
}

/// Query parameters for the nearby listing.
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    /// Distance threshold override.
    pub max_distance: Option<f64>,
}

/// Registered agents near a player.
pub async fn nearby_agents(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let player_id = PlayerId::from(player_id.as_str());
    let nearby = state.groups.nearby_agents(&player_id, query.max_distance).await;
    let listing: Vec<serde_json::Value> = nearby
        .into_iter()
        .map(|(agent, distance)| serde_json::json!({"npc_id": agent, "distance": distance}))
        .collect();
    Ok(Json(serde_json::json!({
        "player_id": player_id,
        "count": listing.len(),
        "nearby_npcs": listing,
    })))
}

/// Body of `POST /api/conversation/start`.
#[derive(Debug, Deserialize, Validate)]
pub struct StartConversationRequest {
    /// The anchoring player.
    #[validate(length(min = 1, max = 64))]
    pub player_id: String,
    /// The player's display name.
    #[serde(default)]
    pub player_name: String,
    /// Explicit participants; omit for auto-discovery.
    pub npc_ids: Option<Vec<String>>,
    /// Location label.
    #[serde(default)]
    pub location: String,
    /// Whether to discover participants by proximity.
    #[serde(default = "default_true")]
    pub auto_discover: bool,
}

fn default_true() -> bool {
    true
}

/// Start a group conversation.
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartConversationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let player_id = PlayerId::from(request.player_id.as_str());
    let player_name = if request.player_name.is_empty() {
        request.player_id.clone()
    } else {
        request.player_name.clone()
    };
    let npc_ids = request
        .npc_ids
        .map(|ids| ids.iter().map(|id| AgentId::from(id.as_str())).collect());
    let location = if request.location.is_empty() {
        "unknown"
    } else {
        request.location.as_str()
    };

    let snapshot = state
        .groups
        .start_conversation(&player_id, &player_name, npc_ids, location, request.auto_discover)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "conversation_started",
        "conversation": snapshot,
    })))
}

/// Body of `POST /api/conversation/{id}/message`.
#[derive(Debug, Deserialize, Validate)]
pub struct ConversationMessageRequest {
    /// The player's message.
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    /// Directly addressed participant, if any.
    pub target_npc_id: Option<String>,
}

/// Send a player message into a conversation.
pub async fn conversation_message(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(request): Json<ConversationMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let group_id: GroupId = parse_id(&group_id)?;
    let target = request.target_npc_id.map(|id| AgentId::from(id.as_str()));

    let (responses, snapshot) = state
        .groups
        .process_message(group_id, &request.message, target.as_ref())
        .await?;

    Ok(Json(serde_json::json!({
        "group_id": group_id,
        "response_count": responses.len(),
        "responses": responses,
        "tension_level": snapshot.tension,
        "topic": snapshot.topic,
    })))
}

/// Body of participant add/remove calls.
#[derive(Debug, Deserialize, Validate)]
pub struct ParticipantRequest {
    /// The agent to add or remove.
    #[validate(length(min = 1, max = 64))]
    pub npc_id: String,
}

/// Add an agent to a conversation.
pub async fn add_participant(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let group_id: GroupId = parse_id(&group_id)?;
    let snapshot = state
        .groups
        .add_agent(group_id, &AgentId::from(request.npc_id.as_str()))
        .await?;
    Ok(Json(serde_json::json!({
        "status": "npc_added",
        "group_id": group_id,
        "total_participants": snapshot.participants.len(),
    })))
}

/// Remove an agent from a conversation.
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    let group_id: GroupId = parse_id(&group_id)?;
    let snapshot = state
        .groups
        .remove_agent(group_id, &AgentId::from(request.npc_id.as_str()))
        .await?;
    Ok(Json(serde_json::json!({
        "status": "npc_removed",
        "group_id": group_id,
        "total_participants": snapshot.participants.len(),
    })))
}

/// End a conversation and return its final state.
pub async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let group_id: GroupId = parse_id(&group_id)?;
    let snapshot = state.groups.end_conversation(group_id).await?;
    Ok(Json(serde_json::json!({
        "status": "conversation_ended",
        "group_id": group_id,
        "total_messages": snapshot.total_messages,
        "final_tension": snapshot.tension,
    })))
}

/// Current state of a conversation.
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let group_id: GroupId = parse_id(&group_id)?;
    let snapshot = state.groups.get(group_id).await?;
    Ok(Json(serde_json::to_value(snapshot).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Conversation system statistics.
pub async fn conversation_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.groups.stats().await;
    Ok(Json(serde_json::to_value(stats).map_err(|e| ApiError::Integrity(e.to_string()))?))
}

/// Sweep idle conversations.
pub async fn cleanup_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let expired = state.groups.cleanup_expired().await;
    Ok(Json(serde_json::json!({"status": "cleanup_complete", "expired": expired})))
}
