//! Integration tests for the observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The model is scripted, the store in-memory,
//! so the full stack runs hermetically.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use haven_agents::{AgentConfig, AgentDeps, PersonaRegistry};
use haven_db::Store;
use haven_events::EventBus;
use haven_groups::GroupManager;
use haven_llm::{LlmBackend, PromptEngine};
use haven_observer::{build_router, AppState};
use haven_scale::TieredScheduler;
use haven_world::{default_territories, seed_territories, Fleet, World};
use serde_json::{json, Value};
use tower::ServiceExt;

const FRIENDLY_FRAME: &str = r#"{
    "internal_reflection": "They seem sincere about helping.",
    "intent": "Socialize",
    "dialogue": "We could use the hands. Welcome.",
    "urgency": 0.3,
    "trust_mod": 0.05,
    "emotional_state": "Warm"
}"#;

async fn make_state() -> Arc<AppState> {
    let store = Store::open_in_memory().await.unwrap();
    let events = Arc::new(EventBus::new());
    let deps = AgentDeps {
        pool: store.pool().clone(),
        llm: Arc::new(LlmBackend::scripted(vec![FRIENDLY_FRAME.to_owned()])),
        prompts: Arc::new(PromptEngine::new().unwrap()),
        events: Arc::clone(&events),
        config: AgentConfig {
            rumor_probability: 0.0,
            ..AgentConfig::default()
        },
    };
    let fleet = Arc::new(Fleet::new(
        deps,
        Arc::new(PersonaRegistry::new()),
        Arc::new(TieredScheduler::new()),
        Arc::clone(&events),
    ));
    seed_territories(&fleet, &default_territories()).await.unwrap();
    let world = Arc::new(World::new(Arc::clone(&fleet)));
    let groups = Arc::new(GroupManager::new(Arc::clone(&fleet)));
    Arc::new(AppState::new(store, fleet, world, groups, events))
}

async fn call(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let router = build_router(Arc::clone(state));
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn init_reports_initialized_then_already_exists() {
    let state = make_state().await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/npc/init",
        Some(json!({"npc_id": "vera", "faction": "guards"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "initialized");
    assert!(body["role"].as_str().is_some());

    let (status, body) = call(
        &state,
        "POST",
        "/api/npc/init",
        Some(json!({"npc_id": "vera"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_exists");
}

#[tokio::test]
async fn action_flow_returns_full_interaction_report() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/npc/vera/action",
        Some(json!({
            "action": "I want to help the settlement.",
            "player_id": "p1",
            "player_name": "Rook"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cognitive_frame"]["intent"], "Socialize");
    assert!(body["reputation_now"].as_f64().unwrap() > 0.0);
    assert!(body["topics_extracted"].as_u64().unwrap() >= 1);
    assert!(body["limbic_state"]["vitals"]["hunger"].is_number());
}

#[tokio::test]
async fn action_on_unknown_agent_is_404() {
    let state = make_state().await;
    let (status, body) = call(
        &state,
        "POST",
        "/api/npc/ghost/action",
        Some(json!({"action": "hello", "player_id": "p1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn empty_action_is_a_validation_error() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/npc/vera/action",
        Some(json!({"action": "", "player_id": "p1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");
}

#[tokio::test]
async fn quest_lifecycle_over_http() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(&state, "POST", "/api/npc/vera/quest/generate", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let quest_id = body["quest"]["id"].as_str().unwrap().to_owned();

    let (status, _) = call(
        &state,
        "POST",
        &format!("/api/quest/{quest_id}/accept"),
        Some(json!({"player_id": "p1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Double accept conflicts.
    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/quest/{quest_id}/accept"),
        Some(json!({"player_id": "p2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/quest/{quest_id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "quest_completed");
    assert!(body["rewards"]["gold"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn attacking_own_territory_is_a_conflict() {
    let state = make_state().await;

    let (_, body) = call(&state, "GET", "/api/territory/control", None).await;
    let territories = body["territories"].as_object().unwrap();
    let (territory_id, territory) = territories
        .iter()
        .find(|(_, t)| t["name"] == "North Ridge")
        .unwrap();
    assert_eq!(territory["controlling_faction"], "guards");

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/territory/{territory_id}/battle"),
        Some(json!({"attacker_faction": "guards"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    // No battle was created.
    let (_, body) = call(&state, "GET", "/api/battles", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn cache_stats_report_configured_capacity() {
    let state = make_state().await;
    let (status, body) = call(&state, "GET", "/api/scaling/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_size"], 5000);
    assert!(body["hit_rate"].is_number());
}

#[tokio::test]
async fn scaling_stats_are_operational() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(&state, "GET", "/api/scaling/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["active_npcs"], 1);
    assert!(body["stats"]["cache"].is_object());
}

#[tokio::test]
async fn optimize_is_idempotent_on_unchanged_data() {
    let state = make_state().await;
    let (status, first) = call(&state, "POST", "/api/scaling/optimize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "optimization_complete");

    let (_, second) = call(&state, "POST", "/api/scaling/optimize", None).await;
    assert_eq!(second["memories_cleaned"], 0);
}

#[tokio::test]
async fn batch_init_reports_per_agent_status() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/batch/init",
        Some(json!({"npc_ids": ["vera", "garrick", "mara"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["initialized"], 2);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    let vera = results.iter().find(|r| r["npc_id"] == "vera").unwrap();
    assert_eq!(vera["status"], "already_exists");
}

#[tokio::test]
async fn world_advance_reports_maintenance() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/world/advance",
        Some(json!({"hours": 48.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sim_hours"], 48.0);
}

#[tokio::test]
async fn conversation_flow_over_http() {
    let state = make_state().await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "vera"}))).await;
    call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": "mara"}))).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/conversation/start",
        Some(json!({
            "player_id": "p1",
            "player_name": "Rook",
            "npc_ids": ["vera", "mara"],
            "location": "gate"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let group_id = body["conversation"]["group_id"].as_str().unwrap().to_owned();

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/conversation/{group_id}/message"),
        Some(json!({"message": "Anything to report?", "target_npc_id": "vera"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response_count"].as_u64().unwrap() >= 1);

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/conversation/{group_id}/end"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "conversation_ended");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let state = make_state().await;
    let (status, body) = call(&state, "POST", "/api/quest/not-a-uuid/complete", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_argument");
}

#[tokio::test]
async fn paginated_listing_has_page_shape() {
    let state = make_state().await;
    for name in ["vera", "garrick", "mara"] {
        call(&state, "POST", "/api/npc/init", Some(json!({"npc_id": name}))).await;
    }

    let (status, body) = call(
        &state,
        "GET",
        "/api/npc/list/paginated?page=1&page_size=2",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["npcs"].as_array().unwrap().len(), 2);
}
