//! The per-agent worker: one task owning all mutable agent state.
//!
//! Each agent is a single logical worker. A mailbox channel serializes
//! reactive cycles (no two cycles of the same agent ever interleave)
//! and the autonomous loop runs as a second arm of the same `select!`,
//! so the two contexts cooperate without locks. Nothing outside the
//! worker mutates persona, personality, vitals or mood.
//!
//! Reactive cycle, in order: load context, think-time delay, model
//! call (with deadline), meta resolution, emotional update, persist,
//! return. A model failure or deadline degrades to the fallback frame
//! and SKIPS the persist step entirely.
//!
//! Autonomous loop: every second vitals decay; every reflection
//! interval the last five memories are distilled into a belief. Errors
//! here are logged and swallowed -- the loop must not die.

use std::sync::Arc;
use std::time::Duration;

use haven_db::{MemoryVault, PlayerStore, RumorPolarity, RumorStore, TopicStore};
use haven_events::EventBus;
use haven_llm::{fallback_frame, parse_cognitive_frame, LlmBackend, PromptEngine, RenderedPrompt};
use haven_types::{
    AgentId, CognitiveFrame, InteractionReport, MemoryKind, Persona, Personality, PlayerId,
};
use rand::Rng;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::context::{ensure_player_session, ReactiveContext};
use crate::error::AgentError;
use crate::limbic::{classify_event, LimbicSystem};
use crate::meta::{
    apply_trait_drift, drift_for_event, evaluate_trust_change, resolve_intent_conflicts,
};

/// Mailbox depth per agent.
const MAILBOX_CAPACITY: usize = 32;

/// Memories summarized per reflection.
const REFLECTION_MEMORIES: u32 = 5;

/// Shared services an agent worker needs.
#[derive(Clone)]
pub struct AgentDeps {
    /// The persistent store.
    pub pool: SqlitePool,
    /// The language-model backend.
    pub llm: Arc<LlmBackend>,
    /// The prompt engine.
    pub prompts: Arc<PromptEngine>,
    /// The event bus.
    pub events: Arc<EventBus>,
    /// Runtime tuning.
    pub config: AgentConfig,
}

/// Point-in-time view of an agent for status surfaces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentSnapshot {
    /// The agent.
    pub agent_id: AgentId,
    /// Static identity.
    pub persona: Persona,
    /// Current (drifted) personality.
    pub personality: Personality,
    /// Current limbic state.
    pub limbic: haven_types::LimbicSnapshot,
}

enum AgentCommand {
    PlayerAction {
        perception: String,
        player_id: PlayerId,
        player_name: Option<String>,
        reply: oneshot::Sender<Result<InteractionReport, AgentError>>,
    },
    Status {
        reply: oneshot::Sender<AgentSnapshot>,
    },
    Stop,
}

/// Cheap, cloneable handle to a running agent worker.
#[derive(Clone)]
pub struct AgentHandle {
    id: AgentId,
    sender: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    /// The agent this handle addresses.
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Whether the worker is still running.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Run one reactive cycle for a player action.
    ///
    /// Cycles are serialized by the worker's mailbox: a second call
    /// queues behind the first.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the worker has shut down, or
    /// any error the cycle itself produced.
    pub async fn process_action(
        &self,
        perception: &str,
        player_id: &PlayerId,
        player_name: Option<&str>,
    ) -> Result<InteractionReport, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(AgentCommand::PlayerAction {
                perception: perception.to_owned(),
                player_id: player_id.clone(),
                player_name: player_name.map(ToOwned::to_owned),
                reply,
            })
            .await
            .map_err(|_| AgentError::Stopped(self.id.to_string()))?;
        rx.await
            .map_err(|_| AgentError::Stopped(self.id.to_string()))?
    }

    /// Current status snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the worker has shut down.
    pub async fn status(&self) -> Result<AgentSnapshot, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(AgentCommand::Status { reply })
            .await
            .map_err(|_| AgentError::Stopped(self.id.to_string()))?;
        rx.await
            .map_err(|_| AgentError::Stopped(self.id.to_string()))
    }

    /// Stop the worker. The autonomous loop is cancelled and further
    /// reactive processing is refused; queued commands ahead of the
    /// stop still complete.
    pub async fn stop(&self) {
        let _ = self.sender.send(AgentCommand::Stop).await;
    }
}

/// Spawn an agent worker and return its handle.
pub fn spawn_agent(
    id: AgentId,
    persona: Persona,
    personality: Personality,
    limbic: LimbicSystem,
    deps: AgentDeps,
) -> AgentHandle {
    let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
    let worker = AgentWorker {
        id: id.clone(),
        persona,
        personality,
        limbic,
        deps,
    };
    tokio::spawn(worker.run(receiver));
    AgentHandle { id, sender }
}

struct AgentWorker {
    id: AgentId,
    persona: Persona,
    personality: Personality,
    limbic: LimbicSystem,
    deps: AgentDeps,
}

impl AgentWorker {
    async fn run(mut self, mut mailbox: mpsc::Receiver<AgentCommand>) {
        debug!(agent = %self.id, role = %self.persona.role, "agent worker started");
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(AgentCommand::PlayerAction { perception, player_id, player_name, reply }) => {
                        let result = self
                            .reactive_cycle(&perception, &player_id, player_name.as_deref())
                            .await;
                        let _ = reply.send(result);
                    }
                    Some(AgentCommand::Status { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(AgentCommand::Stop) | None => break,
                },
                _ = ticker.tick() => self.autonomous_step().await,
            }
        }
        debug!(agent = %self.id, "agent worker stopped");
    }

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.id.clone(),
            persona: self.persona.clone(),
            personality: self.personality,
            limbic: self.limbic.snapshot(),
        }
    }

    // -----------------------------------------------------------------------
    // Reactive cycle (thread A)
    // -----------------------------------------------------------------------

    async fn reactive_cycle(
        &mut self,
        perception: &str,
        player_id: &PlayerId,
        player_name: Option<&str>,
    ) -> Result<InteractionReport, AgentError> {
        ensure_player_session(&self.deps.pool, player_id, player_name).await?;

        // Step 1: context.
        let context = ReactiveContext::load(
            &self.deps.pool,
            &self.deps.config,
            &self.id,
            player_id,
            perception,
        )
        .await?;

        // Step 2: sensory latency.
        let think = self.limbic.think_time() * self.deps.config.think_time_scale;
        tokio::time::sleep(Duration::from_secs_f64(think)).await;

        // Step 3: cognition. Failures below degrade to the fallback
        // frame and skip persistence.
        let prompt = RenderedPrompt {
            system: self.deps.prompts.agent_system(&self.persona, &self.personality)?,
            user: self
                .deps
                .prompts
                .agent_user(&context.to_prompt_value(perception, &self.limbic.snapshot()))?,
        };

        let llm_result =
            tokio::time::timeout(self.deps.config.llm_timeout, self.deps.llm.complete(&prompt))
                .await;
        let frame = match llm_result {
            Ok(Ok(raw)) => match parse_cognitive_frame(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(agent = %self.id, error = %e, "unparseable cognitive frame");
                    return self.degraded_report(fallback_frame(&e.to_string()), player_id).await;
                }
            },
            Ok(Err(e)) => {
                warn!(agent = %self.id, error = %e, "llm backend error");
                return self.degraded_report(fallback_frame(&e.to_string()), player_id).await;
            }
            Err(_) => {
                warn!(agent = %self.id, "llm deadline exceeded");
                return self
                    .degraded_report(fallback_frame("deadline exceeded"), player_id)
                    .await;
            }
        };

        // Step 4: meta resolution. Vitals override cognition.
        let frame = resolve_intent_conflicts(frame, &self.limbic.vitals);
        let trust_delta = evaluate_trust_change(frame.trust_delta(), &self.personality);

        // Step 5: emotional update.
        let tone = classify_event(perception);
        if let Some(tone) = tone {
            self.limbic.apply_event(tone);
        }

        // Step 6: persist.
        let vault = MemoryVault::new(&self.deps.pool);
        vault
            .store_memory(
                &self.id,
                MemoryKind::Episodic,
                &format!("Player action: {perception}"),
                self.deps.config.action_memory_strength,
            )
            .await?;

        let players = PlayerStore::new(&self.deps.pool);
        let reputation_now = players
            .update_reputation(player_id, &self.id, trust_delta)
            .await?;
        players
            .log_action(player_id, &self.id, perception, &frame.dialogue, trust_delta)
            .await?;

        let rumor_roll: f64 = rand::rng().random();
        if rumor_roll < self.deps.config.rumor_probability {
            RumorStore::new(&self.deps.pool)
                .author_rumor(&self.id, player_id, RumorPolarity::from_trust_delta(trust_delta))
                .await?;
        }

        let topic_store = TopicStore::new(&self.deps.pool);
        topic_store
            .reinforce_by_keywords(&self.id, player_id, perception)
            .await?;
        let (topics_extracted, _) = topic_store
            .record_message(&self.id, player_id, perception)
            .await?;

        if let Some((trait_name, impact)) = drift_for_event(frame.urgency, tone) {
            let reason = format!("reaction to: {}", truncate(perception, 120));
            apply_trait_drift(
                &vault,
                &self.id,
                &mut self.personality,
                trait_name,
                impact,
                &reason,
            )
            .await?;
        }

        // Step 7: return the resolved frame + limbic snapshot.
        Ok(InteractionReport {
            cognitive_frame: frame,
            limbic_state: self.limbic.snapshot(),
            reputation_now,
            topics_extracted,
            topics_remembered: context.topics.len(),
            heard_from_others: context.heard_from_others(),
            memories_shared: 0,
        })
    }

    /// Build the report for a degraded cycle. Reads the current
    /// reputation but commits nothing.
    async fn degraded_report(
        &self,
        frame: CognitiveFrame,
        player_id: &PlayerId,
    ) -> Result<InteractionReport, AgentError> {
        let reputation_now = PlayerStore::new(&self.deps.pool)
            .reputation_of(player_id, &self.id)
            .await?;
        Ok(InteractionReport {
            cognitive_frame: frame,
            limbic_state: self.limbic.snapshot(),
            reputation_now,
            topics_extracted: 0,
            topics_remembered: 0,
            heard_from_others: 0,
            memories_shared: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Autonomous loop (thread B)
    // -----------------------------------------------------------------------

    async fn autonomous_step(&mut self) {
        self.limbic.decay_tick();

        if self.limbic.needs_reflection(self.deps.config.reflection_interval) {
            self.limbic.mark_reflection();
            if let Err(e) = self.reflect().await {
                // Autonomous-loop errors are logged and swallowed.
                warn!(agent = %self.id, error = %e, "autonomous reflection failed");
            }
        }
    }

    async fn reflect(&mut self) -> Result<(), AgentError> {
        let vault = MemoryVault::new(&self.deps.pool);
        let memories = vault.recent_memories(&self.id, REFLECTION_MEMORIES).await?;
        if memories.is_empty() {
            return Ok(());
        }

        let ctx = serde_json::json!({
            "memories": memories
                .iter()
                .map(|m| serde_json::json!({"kind": m.kind.as_str(), "content": m.content}))
                .collect::<Vec<_>>(),
        });
        let prompt = RenderedPrompt {
            system: self.deps.prompts.agent_system(&self.persona, &self.personality)?,
            user: self.deps.prompts.reflection(&ctx)?,
        };

        let raw = tokio::time::timeout(self.deps.config.llm_timeout, self.deps.llm.complete(&prompt))
            .await
            .map_err(|_| haven_llm::LlmError::Timeout(self.deps.config.llm_timeout))??;

        let belief = raw.trim();
        if !belief.is_empty() {
            vault
                .save_belief(&self.id, belief, self.deps.config.reflection_belief_strength)
                .await?;
            debug!(agent = %self.id, belief, "reflection produced a belief");
        }
        Ok(())
    }
}

/// Clip a string to at most `max` bytes on a char boundary.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use haven_db::Store;
    use haven_types::{Intent, Vitals};

    const FRIENDLY_FRAME: &str = r#"{
        "internal_reflection": "They seem sincere about helping.",
        "intent": "Socialize",
        "dialogue": "We could use the hands. Welcome.",
        "urgency": 0.3,
        "trust_mod": 0.05,
        "emotional_state": "Warm"
    }"#;

    fn test_persona() -> Persona {
        Persona {
            name: "Vera".to_owned(),
            role: "gate guard".to_owned(),
            location: "the settlement gates".to_owned(),
            dialogue_style: "curt".to_owned(),
            faction: "guards".to_owned(),
            gender: "female".to_owned(),
        }
    }

    async fn deps_with(store: &Store, responses: Vec<String>) -> AgentDeps {
        AgentDeps {
            pool: store.pool().clone(),
            llm: Arc::new(LlmBackend::scripted(responses)),
            prompts: Arc::new(PromptEngine::new().unwrap()),
            events: Arc::new(EventBus::new()),
            config: AgentConfig {
                rumor_probability: 0.0, // deterministic tests
                ..AgentConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn friendly_action_builds_reputation_and_memory() {
        let store = Store::open_in_memory().await.unwrap();
        let deps = deps_with(&store, vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let handle = spawn_agent(
            vera.clone(),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::new(),
            deps,
        );

        let player = PlayerId::from("p1");
        let report = handle
            .process_action("I want to help the settlement.", &player, Some("Rook"))
            .await
            .unwrap();

        assert_eq!(report.cognitive_frame.intent, Intent::Socialize);
        assert!(report.reputation_now > 0.0);
        assert!(report.topics_extracted >= 1);

        // The episodic memory landed.
        let vault = MemoryVault::new(store.pool());
        let memories = vault.recent_memories(&vera, 5).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert!(memories[0].content.contains("help the settlement"));

        // The action log landed.
        let players = PlayerStore::new(store.pool());
        let history = players.action_history(&player, 5).await.unwrap();
        assert_eq!(history.len(), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn hunger_overrides_model_intent() {
        let store = Store::open_in_memory().await.unwrap();
        let deps = deps_with(&store, vec![FRIENDLY_FRAME.to_owned()]).await;
        let handle = spawn_agent(
            AgentId::from("vera"),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::with_vitals(Vitals {
                hunger: 0.85,
                fatigue: 0.2,
            }),
            deps,
        );

        let report = handle
            .process_action("Tell me a story.", &PlayerId::from("p1"), None)
            .await
            .unwrap();

        assert_eq!(report.cognitive_frame.intent, Intent::Investigate);
        assert!(report.cognitive_frame.urgency >= 0.9);
        handle.stop().await;
    }

    #[tokio::test]
    async fn threat_raises_urgency_arousal_and_drifts_paranoia() {
        let store = Store::open_in_memory().await.unwrap();
        let threat_frame = r#"{
            "internal_reflection": "Steel. This just became serious.",
            "intent": "Guard",
            "dialogue": "Put it away. Now.",
            "urgency": 0.8,
            "trust_mod": -0.05,
            "emotional_state": "Alarmed"
        }"#;
        let deps = deps_with(&store, vec![threat_frame.to_owned()]).await;
        let vera = AgentId::from("vera");
        let handle = spawn_agent(
            vera.clone(),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::new(),
            deps,
        );

        let report = handle
            .process_action("I draw my weapon at you.", &PlayerId::from("p1"), None)
            .await
            .unwrap();

        assert!(report.cognitive_frame.urgency >= 0.7);
        assert!(report.limbic_state.emotional_state.arousal > 0.5);
        assert!(report.reputation_now < 0.0);

        let vault = MemoryVault::new(store.pool());
        let history = vault
            .trait_history(&vera, haven_types::TraitName::Paranoia, 5)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].delta.abs() <= 0.1);
        assert!(history[0].resulting_value <= 0.95);
        handle.stop().await;
    }

    #[tokio::test]
    async fn unparseable_output_degrades_without_persisting() {
        let store = Store::open_in_memory().await.unwrap();
        let deps = deps_with(&store, vec!["the guard just shrugs".to_owned()]).await;
        let vera = AgentId::from("vera");
        let handle = spawn_agent(
            vera.clone(),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::new(),
            deps,
        );

        let player = PlayerId::from("p1");
        let report = handle
            .process_action("I wave hello.", &player, None)
            .await
            .unwrap();

        assert_eq!(report.cognitive_frame.intent, Intent::Guard);
        assert_eq!(report.cognitive_frame.dialogue, "...");
        assert!((report.cognitive_frame.urgency - 0.5).abs() < f64::EPSILON);
        assert!(report.reputation_now.abs() < f64::EPSILON);

        // Nothing was committed.
        let vault = MemoryVault::new(store.pool());
        assert!(vault.recent_memories(&vera, 5).await.unwrap().is_empty());
        let players = PlayerStore::new(store.pool());
        assert!(players.action_history(&player, 5).await.unwrap().is_empty());
        handle.stop().await;
    }

    #[tokio::test]
    async fn stopped_agent_refuses_further_actions() {
        let store = Store::open_in_memory().await.unwrap();
        let deps = deps_with(&store, vec![FRIENDLY_FRAME.to_owned()]).await;
        let handle = spawn_agent(
            AgentId::from("vera"),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::new(),
            deps,
        );

        handle.stop().await;
        // Give the worker a beat to drain the stop command.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = handle
            .process_action("hello?", &PlayerId::from("p1"), None)
            .await;
        assert!(matches!(result, Err(AgentError::Stopped(_))));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn status_reports_persona_and_limbic_state() {
        let store = Store::open_in_memory().await.unwrap();
        let deps = deps_with(&store, vec![FRIENDLY_FRAME.to_owned()]).await;
        let handle = spawn_agent(
            AgentId::from("vera"),
            test_persona(),
            Personality::balanced(),
            LimbicSystem::new(),
            deps,
        );

        let snapshot = handle.status().await.unwrap();
        assert_eq!(snapshot.persona.role, "gate guard");
        // Allow for a sliver of autonomous decay between spawn and status.
        assert!((snapshot.limbic.vitals.hunger - 0.2).abs() < 1e-3);
        handle.stop().await;
    }
}
