//! Error types for the data layer.

use haven_types::enums::UnknownVariant;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with existing state (duplicate share,
    /// invalid status transition, attacking own territory, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value violated an invariant of the schema.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<UnknownVariant> for DbError {
    fn from(err: UnknownVariant) -> Self {
        Self::Integrity(err.to_string())
    }
}
