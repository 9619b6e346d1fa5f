//! Data layer for the Haven NPC runtime (SQLite via `sqlx`).
//!
//! SQLite is the single system of record: memories, beliefs, trait
//! drift, conversation topics, shared memories, players, reputation,
//! rumors, inter-agent relations, quests, goals, trade and territory all
//! live here, behind a bounded WAL-mode connection pool. In-memory
//! caches elsewhere are advisory; anything durable goes through the
//! typed stores in this crate.
//!
//! # Modules
//!
//! - [`sqlite`] -- pool configuration, migrations, `ANALYZE`
//! - [`vault`] -- episodic/social/belief memories and the trait ledger
//! - [`topics`] -- keyword-classified topics with decay and sharing
//! - [`players`] -- sessions, reputation edges, action log
//! - [`rumors`] -- rumor authoring and idempotent spread
//! - [`relations`] -- the durable inter-agent relation table
//! - [`quests`] -- quest / chain / goal state machines
//! - [`economy`] -- trade routes, territories, battles
//! - [`error`] -- shared error type

pub mod economy;
pub mod error;
pub mod players;
pub mod quests;
pub mod relations;
pub mod rumors;
pub mod sqlite;
pub mod topics;
pub mod vault;

pub use economy::{BattleRow, EconomyStore, RouteRow, TerritoryRow, TradeOutcome};
pub use error::DbError;
pub use players::{ActionLogRow, PlayerRow, PlayerStore, ReputationEdgeRow};
pub use quests::{ChainRow, GoalRow, GoalStep, QuestRow, QuestStore};
pub use relations::{RelationRow, RelationStore, DEFAULT_RELATION};
pub use rumors::{HeardRumorRow, RumorPolarity, RumorRow, RumorStore};
pub use sqlite::{Store, StoreConfig};
pub use topics::{
    clarity, extract_topics, CleanupReport, DecayReport, ExtractedTopic, ScoredTopic,
    SharedMemoryRow, TopicRow, TopicStore, CLEANUP_THRESHOLD,
};
pub use vault::{sigmoid_clamp, BeliefRow, MemoryRow, MemoryVault, TraitDeltaRow};
