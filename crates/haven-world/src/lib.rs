//! Fleet coordination for the Haven NPC runtime.
//!
//! The world layer sits above individual agents: it owns the registry
//! and faction trust matrix, composes gossip (relation + memory share +
//! rumor spread) in one place, drives the periodic world tick and the
//! deterministic fast-forward, and orchestrates quests, trade and
//! territorial conflict.
//!
//! # Modules
//!
//! - [`registry`] -- agents, factions, trust, agent-to-agent interaction
//! - [`gossip`] -- the single gossip composition point
//! - [`quests`] -- quest / chain / goal generation
//! - [`economy`] -- trade routes, territories, battles
//! - [`tick`] -- the world tick loop and `advance(hours)`
//! - [`error`] -- error type

pub mod economy;
pub mod error;
pub mod gossip;
pub mod quests;
pub mod registry;
pub mod tick;

#[cfg(test)]
pub(crate) mod testutil;

pub use economy::{
    default_territories, establish_route, execute_route, initiate_battle, resolve_battle,
    seed_territories, TerritorySeed,
};
pub use error::WorldError;
pub use gossip::{gossip, share_memories, GossipReport};
pub use quests::{generate_chain, generate_goal, generate_quest};
pub use registry::{
    AgentListEntry, Fleet, InitStatus, InteractionRecord, RegisterOutcome,
};
pub use tick::{TickReport, World, WorldStatus};
