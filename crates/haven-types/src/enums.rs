//! Closed vocabularies of the runtime: intents, memory kinds, topic
//! categories, relation labels, state-machine statuses, update tiers and
//! conversation roles.
//!
//! Everything here serializes to `snake_case` strings; the same strings
//! are what the persistent store keeps in its `TEXT` columns, so
//! `as_str`/`FromStr` pairs are provided wherever a value crosses the
//! database boundary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// The action goal chosen by a reactive cycle.
///
/// The language model is instructed to pick exactly one of these seven.
/// Anything else fails intent parsing and degrades the cycle to the
/// fallback frame -- there is no "unknown" catch-all variant by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Approach and examine the situation.
    Investigate,
    /// Leave the situation immediately.
    Flee,
    /// Offer help to the other party.
    Assist,
    /// Disengage without reacting.
    Ignore,
    /// Engage in friendly conversation.
    Socialize,
    /// Hold position and stay watchful.
    Guard,
    /// Offer or negotiate an exchange.
    Trade,
}

impl Intent {
    /// Parse an intent from model output, case-insensitively.
    ///
    /// Returns `None` for anything outside the seven known intents.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "investigate" => Some(Self::Investigate),
            "flee" => Some(Self::Flee),
            "assist" => Some(Self::Assist),
            "ignore" => Some(Self::Ignore),
            "socialize" => Some(Self::Socialize),
            "guard" => Some(Self::Guard),
            "trade" => Some(Self::Trade),
            _ => None,
        }
    }

    /// Canonical display name (matches the prompt instructions).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Investigate => "Investigate",
            Self::Flee => "Flee",
            Self::Assist => "Assist",
            Self::Ignore => "Ignore",
            Self::Socialize => "Socialize",
            Self::Guard => "Guard",
            Self::Trade => "Trade",
        }
    }
}

// ---------------------------------------------------------------------------
// Memory kinds and topic categories
// ---------------------------------------------------------------------------

/// Kind of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A concrete experienced event.
    Episodic,
    /// A relationship or trust change.
    Social,
    /// A distilled conviction produced by reflection.
    Belief,
}

impl MemoryKind {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Social => "social",
            Self::Belief => "belief",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "episodic" => Some(Self::Episodic),
            "social" => Some(Self::Social),
            "belief" => Some(Self::Belief),
            _ => None,
        }
    }
}

/// Classification of a conversation topic, assigned by keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    /// Relatives, home life.
    Family,
    /// Aspirations and plans.
    Goal,
    /// Things the speaker is afraid of.
    Fear,
    /// Something that happened.
    Event,
    /// Likes and dislikes.
    Preference,
    /// Confided private information.
    Secret,
    /// Where the speaker comes from.
    Origin,
    /// Work and craft.
    Profession,
    /// Wrongdoing, witnessed or committed.
    Crime,
}

impl TopicCategory {
    /// All categories, in keyword-scan order.
    pub const ALL: [Self; 9] = [
        Self::Family,
        Self::Goal,
        Self::Fear,
        Self::Event,
        Self::Preference,
        Self::Secret,
        Self::Origin,
        Self::Profession,
        Self::Crime,
    ];

    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Goal => "goal",
            Self::Fear => "fear",
            Self::Event => "event",
            Self::Preference => "preference",
            Self::Secret => "secret",
            Self::Origin => "origin",
            Self::Profession => "profession",
            Self::Crime => "crime",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "family" => Some(Self::Family),
            "goal" => Some(Self::Goal),
            "fear" => Some(Self::Fear),
            "event" => Some(Self::Event),
            "preference" => Some(Self::Preference),
            "secret" => Some(Self::Secret),
            "origin" => Some(Self::Origin),
            "profession" => Some(Self::Profession),
            "crime" => Some(Self::Crime),
            _ => None,
        }
    }

    /// Base emotional weight assigned to a freshly-extracted topic of this
    /// category, before the per-extra-keyword bonus.
    pub const fn base_weight(self) -> f64 {
        match self {
            Self::Family => 0.7,
            Self::Goal => 0.7,
            Self::Fear => 0.8,
            Self::Event => 0.6,
            Self::Preference => 0.5,
            Self::Secret => 0.9,
            Self::Origin => 0.6,
            Self::Profession => 0.5,
            Self::Crime => 0.85,
        }
    }
}

// ---------------------------------------------------------------------------
// Relation labels
// ---------------------------------------------------------------------------

/// Qualitative label derived from an inter-agent relation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationLabel {
    /// score < 0.2
    Hostile,
    /// 0.2 <= score < 0.4
    Unfriendly,
    /// 0.4 <= score < 0.6
    Neutral,
    /// 0.6 <= score < 0.8
    Friendly,
    /// score >= 0.8
    Allied,
}

impl RelationLabel {
    /// Derive the label for a relation score.
    ///
    /// Buckets are half-open: `hostile < 0.2 <= unfriendly < 0.4 <= neutral
    /// < 0.6 <= friendly < 0.8 <= allied`.
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            Self::Hostile
        } else if score < 0.4 {
            Self::Unfriendly
        } else if score < 0.6 {
            Self::Neutral
        } else if score < 0.8 {
            Self::Friendly
        } else {
            Self::Allied
        }
    }

    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hostile => "hostile",
            Self::Unfriendly => "unfriendly",
            Self::Neutral => "neutral",
            Self::Friendly => "friendly",
            Self::Allied => "allied",
        }
    }
}

// ---------------------------------------------------------------------------
// State-machine statuses (quests, chains, trade, battles, goals)
// ---------------------------------------------------------------------------

/// Lifecycle of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Offered, not yet bound to a player.
    Available,
    /// Accepted by a player.
    Active,
    /// Finished successfully; rewards paid.
    Completed,
    /// Deadline passed while still available.
    Expired,
    /// Accepted but not finished.
    Failed,
}

impl QuestStatus {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "available" => Some(Self::Available),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Lifecycle of a quest chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Created, not yet started.
    Available,
    /// Steps are being worked through.
    InProgress,
    /// Cursor advanced past the last step.
    Completed,
}

impl ChainStatus {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "available" => Some(Self::Available),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Lifecycle of a trade route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// Trades can be executed.
    Active,
    /// Disrupted by risk or attack; must be restored first.
    Disrupted,
}

impl RouteStatus {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disrupted => "disrupted",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "disrupted" => Some(Self::Disrupted),
            _ => None,
        }
    }
}

/// Lifecycle of a territorial battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Initiated, not yet resolved.
    InProgress,
    /// Resolved in favor of the attacker; control transferred.
    AttackerWon,
    /// Resolved in favor of the defender.
    DefenderWon,
}

impl BattleStatus {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::AttackerWon => "attacker_won",
            Self::DefenderWon => "defender_won",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_progress" => Some(Self::InProgress),
            "attacker_won" => Some(Self::AttackerWon),
            "defender_won" => Some(Self::DefenderWon),
            _ => None,
        }
    }
}

/// Lifecycle of an agent goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Being pursued.
    Active,
    /// Progress reached 1.0; rewards credited.
    Completed,
    /// Given up.
    Abandoned,
}

impl GoalStatus {
    /// Database column representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parse the database column representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Update tiers
// ---------------------------------------------------------------------------

/// Update frequency class assigned by the scaling substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateTier {
    /// Interacted within the last minute: updated every tick.
    Active,
    /// Interacted within the last five minutes: every 5th tick.
    Nearby,
    /// Interacted within the last hour: every 20th tick.
    Idle,
    /// Longer than an hour: every 100th tick.
    Dormant,
}

impl UpdateTier {
    /// Tick modulo for this tier: an agent is due when
    /// `tick % modulo == 0`.
    pub const fn modulo(self) -> u64 {
        match self {
            Self::Active => 1,
            Self::Nearby => 5,
            Self::Idle => 20,
            Self::Dormant => 100,
        }
    }

    /// Derive the tier from seconds elapsed since the last interaction.
    pub const fn from_idle_seconds(secs: u64) -> Self {
        if secs < 60 {
            Self::Active
        } else if secs < 300 {
            Self::Nearby
        } else if secs < 3600 {
            Self::Idle
        } else {
            Self::Dormant
        }
    }

    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Nearby => "nearby",
            Self::Idle => "idle",
            Self::Dormant => "dormant",
        }
    }

    /// Parse the display name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "nearby" => Some(Self::Nearby),
            "idle" => Some(Self::Idle),
            "dormant" => Some(Self::Dormant),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation vocabulary
// ---------------------------------------------------------------------------

/// Role of a participant within a conversation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    /// Currently speaking.
    Speaker,
    /// Actively listening.
    Listener,
    /// About to interrupt.
    Interjector,
    /// Passively observing.
    Observer,
}

/// How an agent responds within a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Direct response to the player.
    DirectReply,
    /// Agrees with another participant.
    Agreement,
    /// Disagrees with another participant.
    Disagreement,
    /// Builds on another participant's point.
    Elaboration,
    /// Interrupts the current exchange.
    Interruption,
    /// Steers the conversation elsewhere.
    Redirect,
    /// Chooses not to speak.
    Silent,
}

impl ResponseType {
    /// Parse the orchestrator's snake_case output.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "direct_reply" => Some(Self::DirectReply),
            "agreement" => Some(Self::Agreement),
            "disagreement" => Some(Self::Disagreement),
            "elaboration" => Some(Self::Elaboration),
            "interruption" => Some(Self::Interruption),
            "redirect" => Some(Self::Redirect),
            "silent" => Some(Self::Silent),
            _ => None,
        }
    }

    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectReply => "direct_reply",
            Self::Agreement => "agreement",
            Self::Disagreement => "disagreement",
            Self::Elaboration => "elaboration",
            Self::Interruption => "interruption",
            Self::Redirect => "redirect",
            Self::Silent => "silent",
        }
    }
}

// ---------------------------------------------------------------------------
// Database conversions
// ---------------------------------------------------------------------------

/// A string from the persistent store did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value in store: {raw}")]
pub struct UnknownVariant {
    /// Which vocabulary failed to parse.
    pub kind: &'static str,
    /// The offending string.
    pub raw: String,
}

macro_rules! impl_try_from_string {
    ($ty:ty, $kind:literal) => {
        impl TryFrom<String> for $ty {
            type Error = UnknownVariant;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::parse(&raw).ok_or(UnknownVariant { kind: $kind, raw })
            }
        }
    };
}

impl_try_from_string!(MemoryKind, "memory kind");
impl_try_from_string!(TopicCategory, "topic category");
impl_try_from_string!(QuestStatus, "quest status");
impl_try_from_string!(ChainStatus, "chain status");
impl_try_from_string!(RouteStatus, "route status");
impl_try_from_string!(BattleStatus, "battle status");
impl_try_from_string!(GoalStatus, "goal status");
impl_try_from_string!(UpdateTier, "update tier");

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn intent_parses_case_insensitively() {
        assert_eq!(Intent::parse("Investigate"), Some(Intent::Investigate));
        assert_eq!(Intent::parse("FLEE"), Some(Intent::Flee));
        assert_eq!(Intent::parse("  guard "), Some(Intent::Guard));
    }

    #[test]
    fn unknown_intent_is_rejected() {
        assert_eq!(Intent::parse("Meditate"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn relation_label_buckets_are_half_open() {
        assert_eq!(RelationLabel::from_score(0.0), RelationLabel::Hostile);
        assert_eq!(RelationLabel::from_score(0.19), RelationLabel::Hostile);
        assert_eq!(RelationLabel::from_score(0.2), RelationLabel::Unfriendly);
        assert_eq!(RelationLabel::from_score(0.4), RelationLabel::Neutral);
        assert_eq!(RelationLabel::from_score(0.6), RelationLabel::Friendly);
        assert_eq!(RelationLabel::from_score(0.8), RelationLabel::Allied);
        assert_eq!(RelationLabel::from_score(1.0), RelationLabel::Allied);
    }

    #[test]
    fn tier_modulos() {
        assert_eq!(UpdateTier::Active.modulo(), 1);
        assert_eq!(UpdateTier::Nearby.modulo(), 5);
        assert_eq!(UpdateTier::Idle.modulo(), 20);
        assert_eq!(UpdateTier::Dormant.modulo(), 100);
    }

    #[test]
    fn tier_demotion_thresholds() {
        assert_eq!(UpdateTier::from_idle_seconds(0), UpdateTier::Active);
        assert_eq!(UpdateTier::from_idle_seconds(59), UpdateTier::Active);
        assert_eq!(UpdateTier::from_idle_seconds(60), UpdateTier::Nearby);
        assert_eq!(UpdateTier::from_idle_seconds(299), UpdateTier::Nearby);
        assert_eq!(UpdateTier::from_idle_seconds(300), UpdateTier::Idle);
        assert_eq!(UpdateTier::from_idle_seconds(3599), UpdateTier::Idle);
        assert_eq!(UpdateTier::from_idle_seconds(3600), UpdateTier::Dormant);
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in [
            QuestStatus::Available,
            QuestStatus::Active,
            QuestStatus::Completed,
            QuestStatus::Expired,
            QuestStatus::Failed,
        ] {
            assert_eq!(QuestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ChainStatus::parse("in_progress"), Some(ChainStatus::InProgress));
        assert_eq!(BattleStatus::parse("attacker_won"), Some(BattleStatus::AttackerWon));
        assert_eq!(RouteStatus::parse("disrupted"), Some(RouteStatus::Disrupted));
    }

    #[test]
    fn category_base_weights_are_in_range() {
        for category in TopicCategory::ALL {
            let w = category.base_weight();
            assert!((0.0..=1.0).contains(&w), "{category:?} weight {w}");
        }
    }
}
