//! Shared type definitions for the Haven NPC runtime.
//!
//! Every crate in the workspace speaks these types. The crate is
//! deliberately free of behavior beyond small pure methods (clamping,
//! label derivation, vitals decay) so that it can sit at the bottom of
//! the dependency graph.
//!
//! # Modules
//!
//! - [`ids`] -- strongly-typed identifiers
//! - [`enums`] -- intents, categories, statuses, tiers
//! - [`structs`] -- persona, personality, vitals, emotional state
//! - [`frame`] -- the cognitive frame returned by a reactive cycle

pub mod enums;
pub mod frame;
pub mod ids;
pub mod structs;

pub use enums::{
    BattleStatus, ChainStatus, ConversationRole, GoalStatus, Intent, MemoryKind, QuestStatus,
    RelationLabel, ResponseType, RouteStatus, TopicCategory, UpdateTier,
};
pub use frame::{CognitiveFrame, InteractionReport};
pub use ids::{
    AgentId, BattleId, ChainId, GoalId, GroupId, MemoryId, PlayerId, QuestId, RouteId, RumorId,
    TerritoryId, TopicId,
};
pub use structs::{
    EmotionalState, LimbicSnapshot, Persona, Personality, TraitName, Vitals,
};
