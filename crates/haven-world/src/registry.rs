//! The fleet registry: agents, factions, and the trust matrix.
//!
//! The fleet exclusively owns faction membership and all trust
//! mutations. Trust is the inter-agent relation score persisted in
//! `agent_relations`; same-faction pairs start at 0.6, cross-faction at
//! 0.3, and a change bigger than 0.05 writes a social memory on the
//! affected agent -- serialized with the trust update itself.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use haven_agents::{spawn_agent, AgentDeps, AgentHandle, LimbicSystem, PersonaRegistry};
use haven_db::{MemoryVault, RelationStore};
use haven_events::{EventBus, EventChannel, WorldEvent};
use haven_scale::TieredScheduler;
use haven_types::{AgentId, InteractionReport, MemoryKind, PlayerId, RelationLabel};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::WorldError;

/// Initial trust inside a faction.
const SAME_FACTION_TRUST: f64 = 0.6;

/// Initial trust across factions.
const CROSS_FACTION_TRUST: f64 = 0.3;

/// Trust changes above this magnitude leave a social memory.
const MEMORABLE_TRUST_DELTA: f64 = 0.05;

/// Interaction records retained in memory.
const INTERACTION_HISTORY_CAP: usize = 200;

/// Registration outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    /// A fresh worker was spawned.
    Initialized,
    /// The agent was already registered; nothing changed.
    AlreadyExists,
}

/// Result of a registration call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegisterOutcome {
    /// What happened.
    pub status: InitStatus,
    /// The agent's role.
    pub role: String,
    /// The agent's location.
    pub location: String,
}

/// One line of the fleet listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentListEntry {
    /// Agent id.
    pub id: AgentId,
    /// Role from the persona.
    pub role: String,
    /// Location from the persona.
    pub location: String,
    /// Current mood label.
    pub mood: String,
    /// Faction membership.
    pub faction: String,
}

/// A recorded agent-to-agent interaction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InteractionRecord {
    /// Sender.
    pub from_agent: AgentId,
    /// Listener.
    pub to_agent: AgentId,
    /// The action text.
    pub action: String,
    /// Trust change the listener applied.
    pub trust_impact: f64,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

struct AgentEntry {
    handle: AgentHandle,
    faction: String,
    role: String,
    location: String,
}

struct RegistryState {
    agents: HashMap<AgentId, AgentEntry>,
    factions: HashMap<String, HashSet<AgentId>>,
    faction_relations: HashMap<(String, String), f64>,
    interactions: VecDeque<InteractionRecord>,
}

/// The agent-fleet coordinator's registry half.
pub struct Fleet {
    deps: AgentDeps,
    personas: Arc<PersonaRegistry>,
    scheduler: Arc<TieredScheduler>,
    events: Arc<EventBus>,
    state: RwLock<RegistryState>,
}

impl Fleet {
    /// Create an empty fleet.
    pub fn new(
        deps: AgentDeps,
        personas: Arc<PersonaRegistry>,
        scheduler: Arc<TieredScheduler>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            deps,
            personas,
            scheduler,
            events,
            state: RwLock::new(RegistryState {
                agents: HashMap::new(),
                factions: HashMap::new(),
                faction_relations: HashMap::new(),
                interactions: VecDeque::new(),
            }),
        }
    }

    /// Shared services (pool, llm, prompts, events, config).
    pub const fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    /// The tier scheduler this fleet feeds.
    pub fn scheduler(&self) -> &TieredScheduler {
        self.scheduler.as_ref()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register an agent and spawn its worker.
    ///
    /// Trust toward every already-registered agent is seeded at 0.6
    /// (same faction) or 0.3 (cross-faction). Registering an existing
    /// agent is a no-op reported as `already_exists`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Agent`] if the persona cannot be resolved
    /// or [`WorldError::Db`] if relation seeding fails.
    pub async fn register(
        &self,
        agent_id: &AgentId,
        faction_override: Option<&str>,
    ) -> Result<RegisterOutcome, WorldError> {
        {
            let state = self.state.read().await;
            if let Some(entry) = state.agents.get(agent_id) {
                return Ok(RegisterOutcome {
                    status: InitStatus::AlreadyExists,
                    role: entry.role.clone(),
                    location: entry.location.clone(),
                });
            }
        }

        let (persona, personality) = self.personas.resolve(agent_id)?;
        let faction = faction_override.unwrap_or(&persona.faction).to_owned();

        // Seed trust with every existing agent before the worker goes live.
        let peers: Vec<(AgentId, String)> = {
            let state = self.state.read().await;
            state
                .agents
                .iter()
                .map(|(id, entry)| (id.clone(), entry.faction.clone()))
                .collect()
        };
        let relations = RelationStore::new(&self.deps.pool);
        for (peer, peer_faction) in &peers {
            let initial = if *peer_faction == faction {
                SAME_FACTION_TRUST
            } else {
                CROSS_FACTION_TRUST
            };
            relations.seed(agent_id, peer, initial).await?;
        }

        let handle = spawn_agent(
            agent_id.clone(),
            persona.clone(),
            personality,
            LimbicSystem::new(),
            self.deps.clone(),
        );

        {
            let mut state = self.state.write().await;
            // Lost a race with a concurrent register: keep the first.
            if state.agents.contains_key(agent_id) {
                handle.stop().await;
                let entry = &state.agents[agent_id];
                return Ok(RegisterOutcome {
                    status: InitStatus::AlreadyExists,
                    role: entry.role.clone(),
                    location: entry.location.clone(),
                });
            }
            state.agents.insert(
                agent_id.clone(),
                AgentEntry {
                    handle,
                    faction: faction.clone(),
                    role: persona.role.clone(),
                    location: persona.location.clone(),
                },
            );
            state
                .factions
                .entry(faction.clone())
                .or_default()
                .insert(agent_id.clone());
        }

        self.scheduler.register(agent_id.clone());
        info!(agent = %agent_id, faction = %faction, "agent registered");
        self.events.emit(WorldEvent::now(
            EventChannel::FactionUpdates,
            "agent_registered",
            serde_json::json!({"agent_id": agent_id, "faction": faction}),
        ));

        Ok(RegisterOutcome {
            status: InitStatus::Initialized,
            role: persona.role,
            location: persona.location,
        })
    }

    /// Stop an agent's worker and remove it from the fleet.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotFound`] for an unknown agent.
    pub async fn unregister(&self, agent_id: &AgentId) -> Result<(), WorldError> {
        let entry = {
            let mut state = self.state.write().await;
            let entry = state
                .agents
                .remove(agent_id)
                .ok_or_else(|| WorldError::NotFound(format!("agent {agent_id}")))?;
            if let Some(members) = state.factions.get_mut(&entry.faction) {
                members.remove(agent_id);
            }
            entry
        };

        entry.handle.stop().await;
        self.scheduler.remove(agent_id);
        info!(agent = %agent_id, "agent unregistered");
        Ok(())
    }

    /// Handle to a registered agent's worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotFound`] for an unknown agent.
    pub async fn handle(&self, agent_id: &AgentId) -> Result<AgentHandle, WorldError> {
        let state = self.state.read().await;
        state
            .agents
            .get(agent_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| WorldError::NotFound(format!("agent {agent_id}")))
    }

    /// All registered agent ids.
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        self.state.read().await.agents.keys().cloned().collect()
    }

    /// The faction an agent belongs to.
    pub async fn faction_of(&self, agent_id: &AgentId) -> Option<String> {
        let state = self.state.read().await;
        state.agents.get(agent_id).map(|e| e.faction.clone())
    }

    /// Members of a faction.
    pub async fn faction_members(&self, faction: &str) -> Vec<AgentId> {
        let state = self.state.read().await;
        state
            .factions
            .get(faction)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// List all agents with their current mood.
    pub async fn list(&self) -> Vec<AgentListEntry> {
        let entries: Vec<(AgentId, AgentHandle, String, String, String)> = {
            let state = self.state.read().await;
            state
                .agents
                .iter()
                .map(|(id, e)| {
                    (
                        id.clone(),
                        e.handle.clone(),
                        e.role.clone(),
                        e.location.clone(),
                        e.faction.clone(),
                    )
                })
                .collect()
        };

        let mut listing = Vec::with_capacity(entries.len());
        for (id, handle, role, location, faction) in entries {
            let mood = match handle.status().await {
                Ok(snapshot) => snapshot.limbic.emotional_state.mood,
                Err(_) => "unknown".to_owned(),
            };
            listing.push(AgentListEntry {
                id,
                role,
                location,
                mood,
                faction,
            });
        }
        listing.sort_by(|a, b| a.id.cmp(&b.id));
        listing
    }

    // -----------------------------------------------------------------------
    // Trust
    // -----------------------------------------------------------------------

    /// Current trust between two agents (0.5 for strangers).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Db`] if the read fails.
    pub async fn trust(&self, a: &AgentId, b: &AgentId) -> Result<f64, WorldError> {
        Ok(RelationStore::new(&self.deps.pool).score(a, b).await?)
    }

    /// Apply a trust change, clamped to `[0,1]`.
    ///
    /// A change with magnitude above 0.05 writes a social memory on
    /// `agent` recording the shift; the memory write is serialized with
    /// the trust update.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Db`] if a write fails.
    pub async fn modify_trust(
        &self,
        agent: &AgentId,
        other: &AgentId,
        delta: f64,
    ) -> Result<f64, WorldError> {
        let relations = RelationStore::new(&self.deps.pool);
        let updated = relations.adjust(agent, other, delta, false).await?;

        if delta.abs() > MEMORABLE_TRUST_DELTA {
            MemoryVault::new(&self.deps.pool)
                .store_memory(
                    agent,
                    MemoryKind::Social,
                    &format!("Trust towards {other} changed by {delta:+.2} to {updated:.2}"),
                    0.7,
                )
                .await?;
        }
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Agent-to-agent interaction
    // -----------------------------------------------------------------------

    /// Deliver an action from one agent to another.
    ///
    /// Composes a perception naming the sender and the listener's
    /// current trust in them, runs the listener's reactive cycle,
    /// applies the resulting trust change, and records the interaction.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotFound`] if either agent is unknown.
    pub async fn agent_interaction(
        &self,
        from: &AgentId,
        to: &AgentId,
        action: &str,
    ) -> Result<InteractionReport, WorldError> {
        // Both must exist; the sender is not invoked but must be real.
        self.handle(from).await?;
        let listener = self.handle(to).await?;

        let trust = self.trust(to, from).await?;
        let perception = format!("{from} (trust: {trust:.2}): {action}");
        let counterpart = PlayerId::from(format!("npc:{from}").as_str());

        let report = listener.process_action(&perception, &counterpart, None).await?;

        let trust_impact = report.cognitive_frame.trust_delta();
        if trust_impact != 0.0 {
            self.modify_trust(to, from, trust_impact).await?;
        }

        let mut state = self.state.write().await;
        if state.interactions.len() == INTERACTION_HISTORY_CAP {
            state.interactions.pop_front();
        }
        state.interactions.push_back(InteractionRecord {
            from_agent: from.clone(),
            to_agent: to.clone(),
            action: action.to_owned(),
            trust_impact,
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    /// Recent agent-to-agent interactions, newest last.
    pub async fn interaction_history(&self, limit: usize) -> Vec<InteractionRecord> {
        let state = self.state.read().await;
        let skip = state.interactions.len().saturating_sub(limit);
        state.interactions.iter().skip(skip).cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Faction relations
    // -----------------------------------------------------------------------

    /// Relation between two factions: score in `[0,1]` plus label.
    pub async fn faction_relation(&self, a: &str, b: &str) -> (f64, RelationLabel) {
        let key = faction_key(a, b);
        let state = self.state.read().await;
        let score = state.faction_relations.get(&key).copied().unwrap_or(0.5);
        (score, RelationLabel::from_score(score))
    }

    /// Adjust the relation between two factions, clamped to `[0,1]`.
    pub async fn adjust_faction_relation(&self, a: &str, b: &str, delta: f64) -> f64 {
        let key = faction_key(a, b);
        let mut state = self.state.write().await;
        let score = state.faction_relations.entry(key).or_insert(0.5);
        *score = (*score + delta).clamp(0.0, 1.0);
        *score
    }

    /// Record a manually triggered faction event (skirmish, truce, ...).
    ///
    /// Hostile event kinds lower the relation, friendly ones raise it,
    /// and the event is published to faction subscribers.
    pub async fn record_faction_event(
        &self,
        kind: &str,
        faction_a: &str,
        faction_b: &str,
        description: &str,
    ) -> f64 {
        let delta = match kind {
            "skirmish" | "raid" | "betrayal" => -0.1,
            "alliance" | "truce" | "aid" => 0.1,
            _ => 0.0,
        };
        let score = self.adjust_faction_relation(faction_a, faction_b, delta).await;
        self.events.emit(WorldEvent::now(
            EventChannel::FactionUpdates,
            kind,
            serde_json::json!({
                "faction_a": faction_a,
                "faction_b": faction_b,
                "description": description,
                "relation": score,
            }),
        ));
        score
    }

    /// Per-faction membership and internal trust summary.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Db`] if a trust read fails.
    pub async fn faction_status(&self) -> Result<serde_json::Value, WorldError> {
        let factions: Vec<(String, Vec<AgentId>)> = {
            let state = self.state.read().await;
            state
                .factions
                .iter()
                .map(|(name, members)| (name.clone(), members.iter().cloned().collect()))
                .collect()
        };

        let relations = RelationStore::new(&self.deps.pool);
        let mut status = serde_json::Map::new();
        for (name, members) in factions {
            let mut total = 0.0;
            let mut pairs = 0u32;
            for (i, a) in members.iter().enumerate() {
                for b in members.iter().skip(i + 1) {
                    total += relations.score(a, b).await?;
                    pairs += 1;
                }
            }
            let average_trust = if pairs == 0 {
                1.0
            } else {
                total / f64::from(pairs)
            };
            let count = members.len();
            status.insert(
                name.clone(),
                serde_json::json!({
                    "members": members,
                    "count": count,
                    "average_trust": average_trust,
                }),
            );
        }
        Ok(serde_json::Value::Object(status))
    }
}

/// Canonical unordered faction pair.
fn faction_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testutil::{fleet_with_script, FRIENDLY_FRAME};

    #[tokio::test]
    async fn registration_spawns_and_reports_persona() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");

        let outcome = fleet.register(&vera, Some("guards")).await.unwrap();
        assert_eq!(outcome.status, InitStatus::Initialized);
        assert!(!outcome.role.is_empty());

        let again = fleet.register(&vera, Some("guards")).await.unwrap();
        assert_eq!(again.status, InitStatus::AlreadyExists);

        let listing = fleet.list().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].faction, "guards");
    }

    #[tokio::test]
    async fn faction_seeds_trust_levels() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        let mara = AgentId::from("mara");

        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();
        fleet.register(&mara, Some("outcasts")).await.unwrap();

        let same = fleet.trust(&vera, &garrick).await.unwrap();
        assert!((same - 0.6).abs() < f64::EPSILON);
        let cross = fleet.trust(&vera, &mara).await.unwrap();
        assert!((cross - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn big_trust_change_writes_social_memory() {
        let (fleet, store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();

        fleet.modify_trust(&vera, &garrick, 0.2).await.unwrap();

        let vault = MemoryVault::new(store.pool());
        let memories = vault.recent_memories(&vera, 5).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].kind, MemoryKind::Social);
        assert!(memories[0].content.contains("garrick"));
    }

    #[tokio::test]
    async fn small_trust_change_leaves_no_memory() {
        let (fleet, store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();

        fleet.modify_trust(&vera, &garrick, 0.03).await.unwrap();

        let vault = MemoryVault::new(store.pool());
        assert!(vault.recent_memories(&vera, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interaction_applies_trust_and_records_history() {
        let (fleet, _store) = fleet_with_script(vec![
            FRIENDLY_FRAME.to_owned(),
            FRIENDLY_FRAME.to_owned(),
        ])
        .await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();

        let before = fleet.trust(&garrick, &vera).await.unwrap();
        let report = fleet
            .agent_interaction(&vera, &garrick, "We should coordinate the watch.")
            .await
            .unwrap();
        assert!(!report.cognitive_frame.dialogue.is_empty());

        let after = fleet.trust(&garrick, &vera).await.unwrap();
        assert!(after > before);

        let history = fleet.interaction_history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_agent, vera);
    }

    #[tokio::test]
    async fn unknown_agents_are_not_found() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let result = fleet
            .agent_interaction(
                &AgentId::from("ghost"),
                &AgentId::from("nobody"),
                "hello?",
            )
            .await;
        assert!(matches!(result, Err(WorldError::NotFound(_))));
        assert!(matches!(
            fleet.unregister(&AgentId::from("ghost")).await,
            Err(WorldError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unregister_stops_the_worker() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, None).await.unwrap();
        let handle = fleet.handle(&vera).await.unwrap();

        fleet.unregister(&vera).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_alive());
        assert!(matches!(
            fleet.handle(&vera).await,
            Err(WorldError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn faction_events_move_relations() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let (score, label) = fleet.faction_relation("guards", "outcasts").await;
        assert!((score - 0.5).abs() < f64::EPSILON);
        assert_eq!(label, RelationLabel::Neutral);

        fleet
            .record_faction_event("skirmish", "guards", "outcasts", "border clash")
            .await;
        let (score, _) = fleet.faction_relation("guards", "outcasts").await;
        assert!((score - 0.4).abs() < f64::EPSILON);

        // Symmetric lookup.
        let (reverse, _) = fleet.faction_relation("outcasts", "guards").await;
        assert!((reverse - 0.4).abs() < f64::EPSILON);
    }
}
