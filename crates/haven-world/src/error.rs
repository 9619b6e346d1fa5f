//! Error types for the fleet coordinator.

use haven_agents::AgentError;
use haven_db::DbError;

/// Errors that can occur in the world layer.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A store operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// An agent runtime operation failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A referenced agent, quest or territory does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current world state.
    #[error("conflict: {0}")]
    Conflict(String),
}
