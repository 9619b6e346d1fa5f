//! Conversation group state.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use haven_types::{AgentId, ConversationRole, GroupId, PlayerId, ResponseType};
use serde::Serialize;

/// Maximum participants in one conversation.
pub const MAX_GROUP_SIZE: usize = 6;

/// One participant's live state inside a group.
#[derive(Debug, Clone)]
pub struct Participant {
    /// The agent.
    pub agent_id: AgentId,
    /// Current conversational role.
    pub role: ConversationRole,
    /// Engagement in `[0,1]`.
    pub attention: f64,
    /// When they last spoke.
    pub last_spoke: Option<Instant>,
    /// Statements made so far.
    pub statements: u32,
    /// Mood captured when they joined or last spoke.
    pub mood: String,
}

impl Participant {
    /// A fresh listener.
    pub fn listener(agent_id: AgentId, mood: String) -> Self {
        Self {
            agent_id,
            role: ConversationRole::Listener,
            attention: 1.0,
            last_spoke: None,
            statements: 0,
            mood,
        }
    }

    /// Seconds since this participant last spoke (a large sentinel when
    /// they never have).
    pub fn last_spoke_secs_ago(&self) -> u64 {
        self.last_spoke
            .map_or(999, |at| at.elapsed().as_secs())
    }
}

/// One message in a group's history.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMessage {
    /// Speaker: an agent id, or "player".
    pub speaker_id: String,
    /// Display name of the speaker.
    pub speaker_name: String,
    /// What was said.
    pub content: String,
    /// How it was said.
    pub response_type: ResponseType,
    /// Who it was aimed at, if anyone.
    pub target_id: Option<String>,
    /// Mood of the speaker.
    pub mood: String,
    /// The speaker's private reflection, when an agent spoke.
    pub inner_thoughts: Option<String>,
    /// When it was said.
    pub timestamp: DateTime<Utc>,
}

/// A live conversation group.
#[derive(Debug)]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// The player anchoring the conversation.
    pub player_id: PlayerId,
    /// The player's display name.
    pub player_name: String,
    /// Participants keyed by agent id (ordered for determinism).
    pub participants: BTreeMap<AgentId, Participant>,
    /// Ordered message history.
    pub history: Vec<GroupMessage>,
    /// Location label.
    pub location: String,
    /// Conversation topic label.
    pub topic: String,
    /// Heat of the conversation in `[0,1]`.
    pub tension: f64,
    /// Whether the group is live.
    pub is_active: bool,
    /// When the conversation started.
    pub started_at: DateTime<Utc>,
    /// Last activity, for timeout sweeps.
    pub last_activity: Instant,
}

impl Group {
    /// Create a group with no participants yet.
    pub fn new(player_id: PlayerId, player_name: String, location: String) -> Self {
        Self {
            id: GroupId::new(),
            player_id,
            player_name,
            participants: BTreeMap::new(),
            history: Vec::new(),
            location,
            topic: "general".to_owned(),
            tension: 0.0,
            is_active: true,
            started_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// Add a participant as a listener.
    ///
    /// Fails when the group is full or the agent already participates;
    /// size never exceeds [`MAX_GROUP_SIZE`].
    pub fn add_participant(&mut self, agent_id: AgentId, mood: String) -> Result<(), String> {
        if self.participants.len() >= MAX_GROUP_SIZE {
            return Err(format!("group {} is full", self.id));
        }
        if self.participants.contains_key(&agent_id) {
            return Err(format!("{agent_id} is already in group {}", self.id));
        }
        self.participants
            .insert(agent_id.clone(), Participant::listener(agent_id, mood));
        Ok(())
    }

    /// Remove a participant. An emptied group goes inactive.
    pub fn remove_participant(&mut self, agent_id: &AgentId) -> bool {
        let removed = self.participants.remove(agent_id).is_some();
        if removed && self.participants.is_empty() {
            self.is_active = false;
        }
        removed
    }

    /// Record a message and refresh the activity clock.
    pub fn push_message(&mut self, message: GroupMessage) {
        self.last_activity = Instant::now();
        self.history.push(message);
    }

    /// Apply a tension delta, clamped into `[0,1]`.
    pub fn adjust_tension(&mut self, delta: f64) {
        self.tension = (self.tension + delta).clamp(0.0, 1.0);
    }

    /// Coarse tension description for prompt context.
    pub fn tension_bucket(&self) -> &'static str {
        if self.tension > 0.6 {
            "high"
        } else if self.tension > 0.3 {
            "moderate"
        } else {
            "calm"
        }
    }

    /// Serializable snapshot of the group.
    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            group_id: self.id,
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            location: self.location.clone(),
            topic: self.topic.clone(),
            tension: self.tension,
            is_active: self.is_active,
            started_at: self.started_at,
            idle_secs: self.last_activity.elapsed().as_secs(),
            participants: self
                .participants
                .values()
                .map(|p| ParticipantSnapshot {
                    agent_id: p.agent_id.clone(),
                    role: p.role,
                    attention: p.attention,
                    statements: p.statements,
                    mood: p.mood.clone(),
                    last_spoke_secs_ago: p.last_spoke_secs_ago(),
                })
                .collect(),
            recent_history: self.history.iter().rev().take(10).rev().cloned().collect(),
            total_messages: self.history.len(),
        }
    }
}

/// Serializable participant view.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSnapshot {
    /// The agent.
    pub agent_id: AgentId,
    /// Conversational role.
    pub role: ConversationRole,
    /// Engagement in `[0,1]`.
    pub attention: f64,
    /// Statements made.
    pub statements: u32,
    /// Mood label.
    pub mood: String,
    /// Seconds since they last spoke.
    pub last_spoke_secs_ago: u64,
}

/// Serializable group view.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSnapshot {
    /// Group identifier.
    pub group_id: GroupId,
    /// The anchoring player.
    pub player_id: PlayerId,
    /// The player's name.
    pub player_name: String,
    /// Location label.
    pub location: String,
    /// Topic label.
    pub topic: String,
    /// Tension in `[0,1]`.
    pub tension: f64,
    /// Whether the group is live.
    pub is_active: bool,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Seconds since the last activity.
    pub idle_secs: u64,
    /// Participant views.
    pub participants: Vec<ParticipantSnapshot>,
    /// The last ten messages.
    pub recent_history: Vec<GroupMessage>,
    /// Total message count.
    pub total_messages: usize,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn group() -> Group {
        Group::new(PlayerId::from("p1"), "Rook".to_owned(), "gate".to_owned())
    }

    #[test]
    fn group_size_is_capped() {
        let mut g = group();
        for i in 0..MAX_GROUP_SIZE {
            g.add_participant(AgentId::from(format!("a{i}").as_str()), "Calm".to_owned())
                .unwrap();
        }
        let overflow = g.add_participant(AgentId::from("extra"), "Calm".to_owned());
        assert!(overflow.is_err());
        assert_eq!(g.participants.len(), MAX_GROUP_SIZE);
    }

    #[test]
    fn duplicate_participants_are_rejected() {
        let mut g = group();
        g.add_participant(AgentId::from("vera"), "Calm".to_owned()).unwrap();
        assert!(g.add_participant(AgentId::from("vera"), "Calm".to_owned()).is_err());
    }

    #[test]
    fn removing_last_participant_deactivates() {
        let mut g = group();
        g.add_participant(AgentId::from("vera"), "Calm".to_owned()).unwrap();
        assert!(g.remove_participant(&AgentId::from("vera")));
        assert!(!g.is_active);
        assert!(!g.remove_participant(&AgentId::from("vera")));
    }

    #[test]
    fn tension_is_clamped() {
        let mut g = group();
        g.adjust_tension(0.8);
        g.adjust_tension(0.8);
        assert!((g.tension - 1.0).abs() < f64::EPSILON);
        g.adjust_tension(-3.0);
        assert!(g.tension.abs() < f64::EPSILON);
    }

    #[test]
    fn tension_buckets() {
        let mut g = group();
        assert_eq!(g.tension_bucket(), "calm");
        g.adjust_tension(0.4);
        assert_eq!(g.tension_bucket(), "moderate");
        g.adjust_tension(0.3);
        assert_eq!(g.tension_bucket(), "high");
    }

    #[test]
    fn snapshot_carries_recent_history() {
        let mut g = group();
        g.add_participant(AgentId::from("vera"), "Calm".to_owned()).unwrap();
        for i in 0..15 {
            g.push_message(GroupMessage {
                speaker_id: "player".to_owned(),
                speaker_name: "Rook".to_owned(),
                content: format!("message {i}"),
                response_type: haven_types::ResponseType::DirectReply,
                target_id: None,
                mood: "neutral".to_owned(),
                inner_thoughts: None,
                timestamp: Utc::now(),
            });
        }
        let snap = g.snapshot();
        assert_eq!(snap.total_messages, 15);
        assert_eq!(snap.recent_history.len(), 10);
        assert_eq!(snap.recent_history[9].content, "message 14");
    }
}
