//! Route table for the observer surface.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{agents, conversations, scaling, social, systems, world};
use crate::state::AppState;
use crate::ws;

/// Build the full API router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Agent lifecycle and state
        .route("/api/npc/init", post(agents::init_agent))
        .route("/api/npc/list", get(agents::list_agents))
        .route("/api/npc/list/paginated", get(agents::list_agents_paginated))
        .route("/api/npc/{id}/shutdown", post(agents::shutdown_agent))
        .route("/api/npc/{id}/action", post(agents::agent_action))
        .route("/api/npc/{id}/status", get(agents::agent_status))
        .route("/api/npc/{id}/memories", get(agents::agent_memories))
        .route("/api/npc/{id}/beliefs", get(agents::agent_beliefs))
        .route("/api/npc/{id}/relationships", get(agents::agent_relationships))
        .route("/api/npc/{id}/goals", get(agents::agent_goals))
        .route("/api/npc/{id}/memory/{player}", get(agents::agent_player_memory))
        .route("/api/npc/{id}/rumors/{player}", get(social::heard_rumors))
        // Players and social
        .route("/api/player/{id}", get(social::get_player))
        .route("/api/players", get(social::list_players))
        .route("/api/players/paginated", get(social::list_players))
        .route("/api/player/{id}/topics/{npc}", get(social::player_topics))
        .route("/api/npc/{id}/share/{to}", post(social::share_memories))
        .route("/api/npc/{id}/gossip/{to}", post(social::gossip))
        // Factions
        .route("/api/factions", get(social::factions))
        .route("/api/faction/relation/{a}/{b}", get(social::faction_relation))
        .route("/api/faction/event", post(social::faction_event))
        // World control
        .route("/api/world/start", post(world::start_world))
        .route("/api/world/stop", post(world::stop_world))
        .route("/api/world/status", get(world::world_status))
        .route("/api/world/tick", post(world::manual_tick))
        .route("/api/world/advance", post(world::advance_world))
        .route("/api/world/events", get(world::world_events))
        // Quests, chains, goals
        .route("/api/npc/{id}/quest/generate", post(systems::generate_quest))
        .route("/api/npc/{id}/goal/generate", post(systems::generate_goal))
        .route("/api/quest/{id}/accept", post(systems::accept_quest))
        .route("/api/quest/{id}/complete", post(systems::complete_quest))
        .route("/api/quests", get(systems::list_quests))
        .route("/api/quests/paginated", get(systems::list_quests_paginated))
        .route("/api/questchain/create/{npc}", post(systems::create_chain))
        .route("/api/questchains", get(systems::list_chains))
        .route("/api/questchain/{id}", get(systems::get_chain))
        .route("/api/questchain/{id}/start", post(systems::start_chain))
        .route("/api/questchain/{id}/advance", post(systems::advance_chain))
        // Trade and territory
        .route("/api/traderoute/establish", post(systems::establish_route))
        .route("/api/traderoutes", get(systems::list_routes))
        .route("/api/traderoute/{id}/execute", post(systems::execute_route))
        .route("/api/traderoute/{id}/disrupt", post(systems::disrupt_route))
        .route("/api/traderoute/{id}/restore", post(systems::restore_route))
        .route("/api/territory/control", get(systems::territory_control))
        .route("/api/territory/{id}/battle", post(systems::initiate_battle))
        .route("/api/battle/{id}/resolve", post(systems::resolve_battle))
        .route("/api/battles", get(systems::list_battles))
        // Scaling
        .route("/api/batch/init", post(scaling::batch_init))
        .route("/api/batch/interact", post(scaling::batch_interact))
        .route("/api/bulk/npc_data", post(scaling::bulk_agent_data))
        .route("/api/scaling/stats", get(scaling::scaling_stats))
        .route("/api/scaling/cache", get(scaling::cache_stats))
        .route("/api/scaling/optimize", post(scaling::optimize))
        // Locations and conversations
        .route("/api/location/update", post(conversations::update_location))
        .route("/api/npc/nearby/{player}", get(conversations::nearby_agents))
        .route("/api/conversation/start", post(conversations::start_conversation))
        .route("/api/conversation/{id}/message", post(conversations::conversation_message))
        .route("/api/conversation/{id}/add", post(conversations::add_participant))
        .route("/api/conversation/{id}/remove", post(conversations::remove_participant))
        .route("/api/conversation/{id}/end", post(conversations::end_conversation))
        .route("/api/conversation/{id}", get(conversations::get_conversation))
        .route("/api/conversations/stats", get(conversations::conversation_stats))
        .route("/api/conversations/cleanup", post(conversations::cleanup_conversations))
        // Event stream
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
