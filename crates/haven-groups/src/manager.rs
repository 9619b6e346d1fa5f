//! Group conversation orchestration.
//!
//! A direct address makes the addressed agent the primary responder;
//! the rest may chime in based on personality. An open question goes to
//! the orchestrator model, which picks the next speakers and a tension
//! delta. Either way, each chosen responder's own reactive cycle
//! produces the actual dialogue, so group speech carries the same
//! memory, reputation and topic side effects as one-on-one talk.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use haven_agents::classify_event;
use haven_llm::{parse_orchestration, OrchestratorDecision, RenderedPrompt, SpeakerChoice};
use haven_types::{AgentId, ConversationRole, GroupId, PlayerId, ResponseType};
use haven_world::Fleet;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::GroupError;
use crate::group::{Group, GroupMessage, GroupSnapshot, MAX_GROUP_SIZE};
use crate::location::LocationIndex;

/// Distance within which agents count as "nearby" (world units).
pub const PROXIMITY_THRESHOLD: f64 = 500.0;

/// Idle seconds before a conversation expires.
pub const CONVERSATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Cap on chime-in responders behind the primary.
const MAX_SECONDARY_RESPONDERS: usize = 2;

/// Tension added when the player's message reads as a threat.
const THREAT_TENSION: f64 = 0.05;

/// Tension added per responder beyond the first.
const CROSSTALK_TENSION: f64 = 0.02;

/// Cap on the tension change from a single message.
const TENSION_STEP_CAP: f64 = 0.1;

/// Conversation system statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GroupStats {
    /// Groups ever created (live + ended).
    pub total_conversations: usize,
    /// Currently active groups.
    pub active_conversations: usize,
    /// Tracked agent positions.
    pub tracked_agent_locations: usize,
    /// Tracked player positions.
    pub tracked_player_locations: usize,
    /// The group size cap.
    pub max_group_size: usize,
    /// The proximity threshold in world units.
    pub proximity_threshold: u64,
}

/// Manages all conversation groups.
pub struct GroupManager {
    fleet: Arc<Fleet>,
    locations: LocationIndex,
    groups: RwLock<HashMap<GroupId, Group>>,
}

impl GroupManager {
    /// Create a manager over a fleet.
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            fleet,
            locations: LocationIndex::new(),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// The position index (location updates land here).
    pub const fn locations(&self) -> &LocationIndex {
        &self.locations
    }

    /// Registered agents near a player, nearest first.
    pub async fn nearby_agents(
        &self,
        player: &PlayerId,
        max_distance: Option<f64>,
    ) -> Vec<(AgentId, f64)> {
        let mut nearby = self.locations.nearby_agents(
            player,
            max_distance.unwrap_or(PROXIMITY_THRESHOLD),
            MAX_GROUP_SIZE,
        );
        let mut registered = Vec::with_capacity(nearby.len());
        for (agent, distance) in nearby.drain(..) {
            if self.fleet.handle(&agent).await.is_ok() {
                registered.push((agent, distance));
            }
        }
        registered
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start a conversation for a player.
    ///
    /// Participants come from the explicit list when given, otherwise
    /// from proximity discovery; with no location data at all, any
    /// registered agents fill the group.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidArgument`] when no agents are
    /// available.
    pub async fn start_conversation(
        &self,
        player_id: &PlayerId,
        player_name: &str,
        npc_ids: Option<Vec<AgentId>>,
        location: &str,
        auto_discover: bool,
    ) -> Result<GroupSnapshot, GroupError> {
        let candidates: Vec<AgentId> = if let Some(ids) = npc_ids {
            ids.into_iter().take(MAX_GROUP_SIZE).collect()
        } else if auto_discover {
            let nearby = self.nearby_agents(player_id, None).await;
            if nearby.is_empty() {
                // No location data: fall back to any registered agents.
                let mut all = self.fleet.agent_ids().await;
                all.sort();
                all.truncate(MAX_GROUP_SIZE);
                all
            } else {
                nearby.into_iter().map(|(id, _)| id).collect()
            }
        } else {
            Vec::new()
        };

        let mut group = Group::new(player_id.clone(), player_name.to_owned(), location.to_owned());
        for agent_id in candidates {
            let Ok(handle) = self.fleet.handle(&agent_id).await else {
                continue;
            };
            let mood = handle
                .status()
                .await
                .map_or_else(|_| "neutral".to_owned(), |s| s.limbic.emotional_state.mood);
            // The candidate list is already capped, so this cannot fail
            // on size; duplicates in an explicit list are dropped.
            let _ = group.add_participant(agent_id, mood);
        }

        if group.participants.is_empty() {
            return Err(GroupError::InvalidArgument(
                "no agents available for conversation".to_owned(),
            ));
        }

        debug!(group = %group.id, participants = group.participants.len(), "conversation started");
        let snapshot = group.snapshot();
        self.groups.write().await.insert(group.id, group);
        Ok(snapshot)
    }

    /// Add an agent to a running conversation.
    ///
    /// # Errors
    ///
    /// - [`GroupError::NotFound`] for an unknown group or agent.
    /// - [`GroupError::Conflict`] when the group is full, inactive, or
    ///   already contains the agent.
    pub async fn add_agent(&self, group_id: GroupId, agent_id: &AgentId) -> Result<GroupSnapshot, GroupError> {
        let handle = self.fleet.handle(agent_id).await.map_err(GroupError::World)?;
        let mood = handle
            .status()
            .await
            .map_or_else(|_| "neutral".to_owned(), |s| s.limbic.emotional_state.mood);

        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
        if !group.is_active {
            return Err(GroupError::Conflict(format!("conversation {group_id} has ended")));
        }
        group
            .add_participant(agent_id.clone(), mood)
            .map_err(GroupError::Conflict)?;
        group.push_message(GroupMessage {
            speaker_id: "system".to_owned(),
            speaker_name: "System".to_owned(),
            content: format!("{agent_id} has joined the conversation."),
            response_type: ResponseType::Silent,
            target_id: None,
            mood: "neutral".to_owned(),
            inner_thoughts: None,
            timestamp: Utc::now(),
        });
        Ok(group.snapshot())
    }

    /// Remove an agent from a conversation. Removed participants are
    /// absent from all subsequent history.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotFound`] for an unknown group or a
    /// non-participant.
    pub async fn remove_agent(
        &self,
        group_id: GroupId,
        agent_id: &AgentId,
    ) -> Result<GroupSnapshot, GroupError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
        if !group.remove_participant(agent_id) {
            return Err(GroupError::NotFound(format!(
                "{agent_id} is not in conversation {group_id}"
            )));
        }
        Ok(group.snapshot())
    }

    /// End a conversation and return its final state.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotFound`] for an unknown group.
    pub async fn end_conversation(&self, group_id: GroupId) -> Result<GroupSnapshot, GroupError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
        group.is_active = false;
        Ok(group.snapshot())
    }

    /// Snapshot a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotFound`] for an unknown group.
    pub async fn get(&self, group_id: GroupId) -> Result<GroupSnapshot, GroupError> {
        let groups = self.groups.read().await;
        groups
            .get(&group_id)
            .map(Group::snapshot)
            .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))
    }

    /// Mark idle groups inactive. Returns how many expired.
    pub async fn cleanup_expired(&self) -> usize {
        let mut groups = self.groups.write().await;
        let mut expired = 0;
        for group in groups.values_mut() {
            if group.is_active && group.last_activity.elapsed() > CONVERSATION_TIMEOUT {
                group.is_active = false;
                expired += 1;
            }
        }
        expired
    }

    /// System-wide statistics.
    pub async fn stats(&self) -> GroupStats {
        let groups = self.groups.read().await;
        let (agents, players) = self.locations.tracked_counts();
        GroupStats {
            total_conversations: groups.len(),
            active_conversations: groups.values().filter(|g| g.is_active).count(),
            tracked_agent_locations: agents,
            tracked_player_locations: players,
            max_group_size: MAX_GROUP_SIZE,
            proximity_threshold: PROXIMITY_THRESHOLD as u64,
        }
    }

    // -----------------------------------------------------------------------
    // Message handling
    // -----------------------------------------------------------------------

    /// Process a player message; returns the agent responses plus the
    /// group state afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotFound`] for an unknown group and
    /// [`GroupError::Conflict`] for an ended one.
    pub async fn process_message(
        &self,
        group_id: GroupId,
        message: &str,
        target: Option<&AgentId>,
    ) -> Result<(Vec<GroupMessage>, GroupSnapshot), GroupError> {
        // Record the player's message and capture the context while the
        // lock is held; agent cycles run lock-free afterwards.
        let (player_id, player_name, participant_ids, orchestrator_ctx) = {
            let mut groups = self.groups.write().await;
            let group = groups
                .get_mut(&group_id)
                .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
            if !group.is_active {
                return Err(GroupError::Conflict(format!("conversation {group_id} has ended")));
            }
            group.push_message(GroupMessage {
                speaker_id: "player".to_owned(),
                speaker_name: group.player_name.clone(),
                content: message.to_owned(),
                response_type: ResponseType::DirectReply,
                target_id: target.map(ToString::to_string),
                mood: "neutral".to_owned(),
                inner_thoughts: None,
                timestamp: Utc::now(),
            });

            let ids: Vec<AgentId> = group.participants.keys().cloned().collect();
            (
                group.player_id.clone(),
                group.player_name.clone(),
                ids,
                self.orchestrator_context(group, message),
            )
        };

        // Decide who speaks.
        let decision = match target {
            Some(target) if participant_ids.contains(target) => {
                let mut speakers = vec![SpeakerChoice {
                    npc_id: target.to_string(),
                    response_type: ResponseType::DirectReply,
                    target_id: Some("player".to_owned()),
                    urgency: 1.0,
                }];
                speakers.extend(self.chime_ins(&participant_ids, target).await);
                OrchestratorDecision {
                    next_speakers: speakers,
                    tension_change: direct_address_tension(message, &participant_ids),
                }
            }
            _ => {
                self.orchestrate(group_id, &participant_ids, &orchestrator_ctx)
                    .await
            }
        };

        // Generate the responses through each agent's reactive cycle.
        let mut responses = Vec::new();
        for choice in &decision.next_speakers {
            if choice.response_type == ResponseType::Silent {
                continue;
            }
            let agent_id = AgentId::from(choice.npc_id.as_str());
            if !participant_ids.contains(&agent_id) {
                continue;
            }
            match self
                .generate_response(&agent_id, group_id, message, &player_id, &player_name, choice)
                .await
            {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => {}
                Err(e) => warn!(agent = %agent_id, error = %e, "group response failed"),
            }
        }

        // Fold results back into the group.
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
        group.adjust_tension(decision.tension_change);
        for response in &responses {
            let speaker = AgentId::from(response.speaker_id.as_str());
            if let Some(participant) = group.participants.get_mut(&speaker) {
                participant.last_spoke = Some(Instant::now());
                participant.statements += 1;
                participant.role = ConversationRole::Speaker;
                participant.mood = response.mood.clone();
            }
            group.push_message(response.clone());
        }
        Ok((responses, group.snapshot()))
    }

    /// Personality-driven chime-ins behind a directly addressed agent.
    async fn chime_ins(&self, participants: &[AgentId], primary: &AgentId) -> Vec<SpeakerChoice> {
        let mut secondary = Vec::new();
        for agent_id in participants {
            if agent_id == primary || secondary.len() >= MAX_SECONDARY_RESPONDERS {
                continue;
            }
            let Ok(handle) = self.fleet.handle(agent_id).await else {
                continue;
            };
            let Ok(snapshot) = handle.status().await else {
                continue;
            };
            let p = snapshot.personality;
            let chime_prob = (p.curiosity + p.empathy) / 4.0 + p.aggression * 0.2;

            let (roll, flip): (f64, bool) = {
                let mut rng = rand::rng();
                (rng.random(), rng.random_bool(0.5))
            };
            if roll >= chime_prob {
                continue;
            }

            let response_type = if p.aggression > 0.6 {
                if flip { ResponseType::Disagreement } else { ResponseType::Elaboration }
            } else if p.empathy > 0.6 {
                if flip { ResponseType::Agreement } else { ResponseType::Elaboration }
            } else {
                ResponseType::Elaboration
            };

            secondary.push(SpeakerChoice {
                npc_id: agent_id.to_string(),
                response_type,
                target_id: Some(primary.to_string()),
                urgency: 0.5,
            });
        }
        secondary
    }

    /// Ask the orchestrator model who speaks next. Falls back to the
    /// longest-idle participant on any failure.
    async fn orchestrate(
        &self,
        group_id: GroupId,
        participants: &[AgentId],
        context: &serde_json::Value,
    ) -> OrchestratorDecision {
        let deps = self.fleet.deps();
        let decision = async {
            let prompt = RenderedPrompt {
                system: deps.prompts.orchestrator_system()?,
                user: deps.prompts.orchestrator_user(context)?,
            };
            let raw = tokio::time::timeout(deps.config.llm_timeout, deps.llm.complete(&prompt))
                .await
                .map_err(|_| haven_llm::LlmError::Timeout(deps.config.llm_timeout))??;
            parse_orchestration(&raw)
        }
        .await;

        match decision {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "orchestrator failed, using default responder");
                self.default_responder(group_id, participants).await
            }
        }
    }

    /// Fallback: the participant who has been silent longest replies.
    async fn default_responder(
        &self,
        group_id: GroupId,
        participants: &[AgentId],
    ) -> OrchestratorDecision {
        let longest_idle: Option<AgentId> = {
            let groups = self.groups.read().await;
            groups.get(&group_id).and_then(|group| {
                participants
                    .iter()
                    .max_by_key(|id| {
                        group
                            .participants
                            .get(*id)
                            .map_or(u64::MAX, crate::group::Participant::last_spoke_secs_ago)
                    })
                    .cloned()
            })
        };

        let next_speakers = longest_idle
            .map(|agent_id| {
                vec![SpeakerChoice {
                    npc_id: agent_id.to_string(),
                    response_type: ResponseType::DirectReply,
                    target_id: Some("player".to_owned()),
                    urgency: 0.7,
                }]
            })
            .unwrap_or_default();

        OrchestratorDecision {
            next_speakers,
            tension_change: 0.0,
        }
    }

    /// Build the orchestrator's user-prompt context from group state.
    fn orchestrator_context(&self, group: &Group, message: &str) -> serde_json::Value {
        let participants: Vec<serde_json::Value> = group
            .participants
            .values()
            .map(|p| {
                serde_json::json!({
                    "npc_id": p.agent_id,
                    "role": p.role,
                    "mood": p.mood,
                    "statements": p.statements,
                    "last_spoke_secs_ago": p.last_spoke_secs_ago(),
                })
            })
            .collect();

        let history: Vec<serde_json::Value> = group
            .history
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|m| {
                serde_json::json!({
                    "speaker": m.speaker_name,
                    "content": clip(&m.content, 100),
                })
            })
            .collect();

        serde_json::json!({
            "location": group.location,
            "tension": group.tension,
            "topic": group.topic,
            "participants": participants,
            "history": history,
            "message": message,
        })
    }

    /// Run one participant's reactive cycle for a group response.
    async fn generate_response(
        &self,
        agent_id: &AgentId,
        group_id: GroupId,
        message: &str,
        player_id: &PlayerId,
        player_name: &str,
        choice: &SpeakerChoice,
    ) -> Result<Option<GroupMessage>, GroupError> {
        let handle = self.fleet.handle(agent_id).await?;

        let context = {
            let groups = self.groups.read().await;
            let group = groups
                .get(&group_id)
                .ok_or_else(|| GroupError::NotFound(format!("conversation {group_id}")))?;
            self.response_context(group, agent_id, message, choice)
        };

        let report = handle.process_action(&context, player_id, Some(player_name)).await?;
        let frame = report.cognitive_frame;
        if frame.dialogue.is_empty() {
            return Ok(None);
        }

        let speaker_name = handle
            .status()
            .await
            .map_or_else(|_| agent_id.to_string(), |s| s.persona.name);

        Ok(Some(GroupMessage {
            speaker_id: agent_id.to_string(),
            speaker_name,
            content: frame.dialogue,
            response_type: choice.response_type,
            target_id: choice.target_id.clone(),
            mood: frame.emotional_state,
            inner_thoughts: Some(frame.internal_reflection),
            timestamp: Utc::now(),
        }))
    }

    /// Synthesize the perception an agent receives for a group turn.
    fn response_context(
        &self,
        group: &Group,
        agent_id: &AgentId,
        message: &str,
        choice: &SpeakerChoice,
    ) -> String {
        let others: Vec<String> = group
            .participants
            .keys()
            .filter(|id| *id != agent_id)
            .map(ToString::to_string)
            .collect();

        let mut parts = vec![
            format!("[GROUP CONVERSATION at {}]", group.location),
            format!("Other participants: {}", others.join(", ")),
            format!("Tension level: {}", group.tension_bucket()),
        ];

        if !group.history.is_empty() {
            parts.push("Recent conversation:".to_owned());
            for msg in group.history.iter().rev().take(3).rev() {
                parts.push(format!("  {}: {}", msg.speaker_name, clip(&msg.content, 80)));
            }
        }

        parts.push(response_instruction(choice).to_owned());
        parts.push(format!("Player ({}) says: {message}", group.player_name));
        parts.join("\n")
    }
}

/// Tension heuristic for the direct-address path: threats heat the room,
/// crosstalk adds a little more, capped at one step.
fn direct_address_tension(message: &str, participants: &[AgentId]) -> f64 {
    let mut delta = 0.0;
    if matches!(classify_event(message), Some(haven_agents::EventTone::Threat)) {
        delta += THREAT_TENSION;
    }
    if participants.len() > 1 {
        delta += CROSSTALK_TENSION;
    }
    delta.min(TENSION_STEP_CAP)
}

/// The per-response-type instruction injected into the agent's context.
fn response_instruction(choice: &SpeakerChoice) -> String {
    let target = choice.target_id.as_deref().unwrap_or("the player");
    match choice.response_type {
        ResponseType::DirectReply => "Respond directly to the player.".to_owned(),
        ResponseType::Agreement => {
            format!("You agree with what {target} said. Express your agreement and add your perspective.")
        }
        ResponseType::Disagreement => {
            format!("You disagree with {target}. Voice your disagreement firmly but in character.")
        }
        ResponseType::Elaboration => {
            format!("Build upon what {target} said. Add more information or context.")
        }
        ResponseType::Interruption => "You feel compelled to interrupt. Make your point urgently.".to_owned(),
        ResponseType::Redirect => "Change the topic to something you think matters more.".to_owned(),
        ResponseType::Silent => String::new(),
    }
}

/// Clip a string for prompt context.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_owned()
    } else {
        let clipped: String = text.chars().take(max).collect();
        format!("{clipped}...")
    }
}
