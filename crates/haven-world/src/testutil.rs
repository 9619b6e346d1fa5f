//! Shared fixtures for the world-layer test suites.

use std::sync::Arc;

use haven_agents::{AgentConfig, AgentDeps, PersonaRegistry};
use haven_db::Store;
use haven_events::EventBus;
use haven_llm::{LlmBackend, PromptEngine};
use haven_scale::TieredScheduler;

use crate::registry::Fleet;

/// A friendly, trusting cognitive frame.
pub const FRIENDLY_FRAME: &str = r#"{
    "internal_reflection": "They seem sincere about helping.",
    "intent": "Socialize",
    "dialogue": "We could use the hands. Welcome.",
    "urgency": 0.3,
    "trust_mod": 0.05,
    "emotional_state": "Warm"
}"#;

/// Build a fleet over an in-memory store with a scripted model.
///
/// Rumor authoring is disabled so tests stay deterministic; suites that
/// exercise rumors author them explicitly through the store.
pub async fn fleet_with_script(responses: Vec<String>) -> (Arc<Fleet>, Store) {
    let store = Store::open_in_memory()
        .await
        .unwrap_or_else(|e| panic!("in-memory store: {e}"));
    let events = Arc::new(EventBus::new());
    let deps = AgentDeps {
        pool: store.pool().clone(),
        llm: Arc::new(LlmBackend::scripted(responses)),
        prompts: Arc::new(PromptEngine::new().unwrap_or_else(|e| panic!("prompt engine: {e}"))),
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
        events,
    ));
    (fleet, store)
}
