//! REST endpoint handlers, grouped by surface area.
//!
//! Every handler reads through [`crate::state::AppState`] and returns
//! either JSON or a taxonomy-tagged [`crate::error::ApiError`].

pub mod agents;
pub mod conversations;
pub mod scaling;
pub mod social;
pub mod systems;
pub mod world;

use std::str::FromStr;

use crate::error::ApiError;

/// Parse a typed identifier from a path segment.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ApiError::InvalidArgument(format!("malformed id {raw}: {e}")))
}
