//! The API error taxonomy and its HTTP mapping.
//!
//! Callers always receive a structured JSON body; validation errors are
//! distinguishable from unavailability by the taxonomy tag. A language
//! model timeout never reaches this layer as an error -- the reactive
//! cycle already degraded it into a cautious frame.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use haven_agents::AgentError;
use haven_db::DbError;
use haven_groups::GroupError;
use haven_world::WorldError;

/// Errors surfaced by the observer API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown agent, player, quest, group: no state change.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing required field or out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Pool exhausted, model unavailable, worker stopped.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Duplicate registration, invalid transition, own-territory attack.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A store invariant was violated; the operation aborted.
    #[error("integrity: {0}")]
    Integrity(String),
}

impl ApiError {
    /// Taxonomy tag carried in the response body.
    const fn tag(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unavailable(_) => "unavailable",
            Self::Conflict(_) => "conflict",
            Self::Integrity(_) => "integrity",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.tag(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Self::NotFound(msg),
            DbError::Conflict(msg) => Self::Conflict(msg),
            DbError::Integrity(msg) => Self::Integrity(msg),
            DbError::Serialization(e) => Self::Integrity(e.to_string()),
            DbError::Sqlite(e) => Self::Unavailable(e.to_string()),
            DbError::Migration(e) => Self::Unavailable(e.to_string()),
            DbError::Config(msg) => Self::Unavailable(msg),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Db(e) => e.into(),
            AgentError::MissingPersona(agent) => Self::NotFound(format!("persona for {agent}")),
            AgentError::Stopped(agent) => Self::Unavailable(format!("agent {agent} is stopped")),
            AgentError::Llm(e) => Self::Unavailable(e.to_string()),
        }
    }
}

impl From<WorldError> for ApiError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::Db(e) => e.into(),
            WorldError::Agent(e) => e.into(),
            WorldError::NotFound(msg) => Self::NotFound(msg),
            WorldError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<GroupError> for ApiError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::NotFound(msg) => Self::NotFound(msg),
            GroupError::Conflict(msg) => Self::Conflict(msg),
            GroupError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            GroupError::World(e) => e.into(),
            GroupError::Agent(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
