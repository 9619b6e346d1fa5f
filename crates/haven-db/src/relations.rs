//! Inter-agent relations: the durable half of the fleet's trust matrix.
//!
//! Relations are stored once per unordered pair (lexicographically
//! canonicalized) and read symmetrically. Scores live in `[0,1]`; the
//! qualitative label is derived from the score at read time.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, RelationLabel};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Default relation score for agents that never interacted.
pub const DEFAULT_RELATION: f64 = 0.5;

/// A row from the `agent_relations` table, plus the derived label.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RelationRow {
    /// One side of the pair.
    pub agent_a: AgentId,
    /// The other side.
    pub agent_b: AgentId,
    /// Relation score in `[0,1]`.
    pub score: f64,
    /// Label derived from the score.
    pub label: RelationLabel,
    /// Shared experiences (gossip exchanges, joint events).
    pub shared_experiences: i64,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Canonical ordering for an unordered agent pair.
fn canonical<'p>(a: &'p AgentId, b: &'p AgentId) -> (&'p AgentId, &'p AgentId) {
    if a.as_str() <= b.as_str() { (a, b) } else { (b, a) }
}

/// Typed operations on the `agent_relations` table.
pub struct RelationStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RelationStore<'a> {
    /// Create a relation store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Seed the relation for a pair if absent (used at registration).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the write fails.
    pub async fn seed(&self, a: &AgentId, b: &AgentId, score: f64) -> Result<(), DbError> {
        let (first, second) = canonical(a, b);
        sqlx::query(
            r"INSERT INTO agent_relations (agent_a, agent_b, score, shared_experiences, updated_at)
              VALUES (?, ?, ?, 0, ?)
              ON CONFLICT (agent_a, agent_b) DO NOTHING",
        )
        .bind(first.as_str())
        .bind(second.as_str())
        .bind(score.clamp(0.0, 1.0))
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// The relation score between two agents (0.5 if never seeded).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn score(&self, a: &AgentId, b: &AgentId) -> Result<f64, DbError> {
        let (first, second) = canonical(a, b);
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT score FROM agent_relations WHERE agent_a = ? AND agent_b = ?",
        )
        .bind(first.as_str())
        .bind(second.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map_or(DEFAULT_RELATION, |(s,)| s))
    }

    /// Adjust a relation by `delta`, clamped into `[0,1]`, bumping the
    /// shared-experience counter when `shared_experience` is set.
    /// Returns the new score.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn adjust(
        &self,
        a: &AgentId,
        b: &AgentId,
        delta: f64,
        shared_experience: bool,
    ) -> Result<f64, DbError> {
        let current = self.score(a, b).await?;
        let updated = (current + delta).clamp(0.0, 1.0);
        let (first, second) = canonical(a, b);
        let bump = i64::from(shared_experience);

        sqlx::query(
            r"INSERT INTO agent_relations (agent_a, agent_b, score, shared_experiences, updated_at)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT (agent_a, agent_b) DO UPDATE SET
                score = excluded.score,
                shared_experiences = agent_relations.shared_experiences + ?,
                updated_at = excluded.updated_at",
        )
        .bind(first.as_str())
        .bind(second.as_str())
        .bind(updated)
        .bind(bump)
        .bind(Utc::now())
        .bind(bump)
        .execute(self.pool)
        .await?;
        Ok(updated)
    }

    /// All relations involving an agent, symmetric view with the queried
    /// agent always on the `agent_a` side.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn relations_of(&self, agent: &AgentId) -> Result<Vec<RelationRow>, DbError> {
        #[derive(sqlx::FromRow)]
        struct RawRelation {
            agent_a: String,
            agent_b: String,
            score: f64,
            shared_experiences: i64,
            updated_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, RawRelation>(
            "SELECT * FROM agent_relations WHERE agent_a = ? OR agent_b = ? ORDER BY score DESC",
        )
        .bind(agent.as_str())
        .bind(agent.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|raw| {
                // Flip so the queried agent is always agent_a.
                let (agent_a, agent_b) = if raw.agent_a == agent.as_str() {
                    (AgentId::from(raw.agent_a), AgentId::from(raw.agent_b))
                } else {
                    (AgentId::from(raw.agent_b), AgentId::from(raw.agent_a))
                };
                RelationRow {
                    agent_a,
                    agent_b,
                    score: raw.score,
                    label: RelationLabel::from_score(raw.score),
                    shared_experiences: raw.shared_experiences,
                    updated_at: raw.updated_at,
                }
            })
            .collect())
    }
}
