//! Error types for the agent runtime.

use haven_db::DbError;
use haven_llm::LlmError;

/// Errors that can occur inside an agent's runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A store operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A language-model operation failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// No persona is registered for the agent and the registry is strict.
    #[error("no persona registered for agent {0}")]
    MissingPersona(String),

    /// The agent's worker has stopped; its mailbox is closed.
    #[error("agent {0} is stopped")]
    Stopped(String),
}
