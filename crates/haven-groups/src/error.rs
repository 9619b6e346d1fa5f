//! Error types for conversation groups.

use haven_agents::AgentError;
use haven_world::WorldError;

/// Errors that can occur in the conversation layer.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// A referenced group or participant does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with group state (full group, duplicate
    /// participant, inactive group).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No agents are available to converse with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The world layer failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// An agent's reactive cycle failed.
    #[error(transparent)]
    Agent(#[from] AgentError),
}
