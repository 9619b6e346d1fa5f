//! Per-agent cognitive runtime.
//!
//! Each NPC is an always-on agent with two cooperating execution
//! contexts: a reactive cycle that answers player inputs and an
//! autonomous loop that advances vitals and reflective beliefs in the
//! background. Both run inside one worker task per agent
//! ([`runtime::spawn_agent`]), which exclusively owns the agent's
//! persona, personality, vitals and mood.
//!
//! # Modules
//!
//! - [`limbic`] -- vitals, emotions, think time
//! - [`meta`] -- vitals override, trust scaling, bounded trait drift
//! - [`persona`] -- persona registry and procedural generation
//! - [`context`] -- reactive-cycle context assembly
//! - [`runtime`] -- the worker, its mailbox, and the two loops
//! - [`config`] -- tunables
//! - [`error`] -- error type

pub mod config;
pub mod context;
pub mod error;
pub mod limbic;
pub mod meta;
pub mod persona;
pub mod runtime;

pub use config::AgentConfig;
pub use context::ReactiveContext;
pub use error::AgentError;
pub use limbic::{classify_event, EventTone, LimbicSystem};
pub use persona::{generate_persona, PersonaRegistry};
pub use runtime::{spawn_agent, AgentDeps, AgentHandle, AgentSnapshot};
