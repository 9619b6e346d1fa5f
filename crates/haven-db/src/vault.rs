//! Memory vault: episodic/social/belief memories, summary beliefs, and
//! the trait-drift ledger.
//!
//! The vault is the only writer of the `memories`, `beliefs` and
//! `trait_ledger` tables. Trait appends pass the resulting value through
//! a sigmoid soft-clamp
//!
//! ```text
//! clamped = 0.05 + 0.9 * sigmoid(10 * (raw - 0.5))
//! ```
//!
//! so repeated same-signed deltas asymptote toward, but never exit,
//! `[0.05, 0.95]` -- the humanity bounds.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, MemoryId, MemoryKind, TraitName};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Lower asymptote of the trait soft-clamp.
pub const TRAIT_FLOOR: f64 = 0.05;

/// Upper asymptote of the trait soft-clamp.
pub const TRAIT_CEIL: f64 = 0.95;

/// Apply the sigmoid soft-clamp to a raw trait value.
///
/// Maps the real line into `(0.05, 0.95)`; 0.5 maps to exactly 0.5.
pub fn sigmoid_clamp(raw: f64) -> f64 {
    let x = 10.0 * (raw - 0.5);
    let sigmoid = 1.0 / (1.0 + (-x).exp());
    TRAIT_FLOOR + 0.9 * sigmoid
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `memories` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct MemoryRow {
    /// Memory identifier.
    #[sqlx(try_from = "String")]
    pub id: MemoryId,
    /// Owning agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Memory kind.
    #[sqlx(try_from = "String")]
    pub kind: MemoryKind,
    /// Free-form content.
    pub content: String,
    /// Strength in `[0,1]`.
    pub strength: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A row from the `beliefs` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct BeliefRow {
    /// Row id.
    pub id: i64,
    /// Owning agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// The distilled belief sentence.
    pub belief: String,
    /// Strength in `[0,1]`.
    pub strength: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A row from the `trait_ledger` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct TraitDeltaRow {
    /// Row id.
    pub id: i64,
    /// Owning agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Which trait drifted.
    #[sqlx(try_from = "String")]
    pub trait_name: TraitName,
    /// Signed drift applied.
    pub delta: f64,
    /// Why the drift happened.
    pub reason: String,
    /// Soft-clamped value after the drift.
    pub resulting_value: f64,
    /// When the drift was recorded.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// MemoryVault
// ---------------------------------------------------------------------------

/// Typed operations on the vault tables.
pub struct MemoryVault<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MemoryVault<'a> {
    /// Create a vault bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a memory for an agent. Returns the new memory's id.
    ///
    /// Strength is clamped to `[0,1]` before the write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn store_memory(
        &self,
        agent_id: &AgentId,
        kind: MemoryKind,
        content: &str,
        strength: f64,
    ) -> Result<MemoryId, DbError> {
        let id = MemoryId::new();
        sqlx::query(
            r"INSERT INTO memories (id, agent_id, kind, content, strength, created_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(agent_id.as_str())
        .bind(kind.as_str())
        .bind(content)
        .bind(strength.clamp(0.0, 1.0))
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(id)
    }

    /// Fetch the most recent memories for an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn recent_memories(
        &self,
        agent_id: &AgentId,
        limit: u32,
    ) -> Result<Vec<MemoryRow>, DbError> {
        let rows = sqlx::query_as::<_, MemoryRow>(
            r"SELECT id, agent_id, kind, content, strength, created_at
              FROM memories WHERE agent_id = ?
              ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(agent_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Store a summary belief with the given strength.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn save_belief(
        &self,
        agent_id: &AgentId,
        belief: &str,
        strength: f64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO beliefs (agent_id, belief, strength, created_at)
              VALUES (?, ?, ?, ?)",
        )
        .bind(agent_id.as_str())
        .bind(belief)
        .bind(strength.clamp(0.0, 1.0))
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch the top-strength beliefs for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn top_beliefs(
        &self,
        agent_id: &AgentId,
        limit: u32,
    ) -> Result<Vec<BeliefRow>, DbError> {
        let rows = sqlx::query_as::<_, BeliefRow>(
            r"SELECT id, agent_id, belief, strength, created_at
              FROM beliefs WHERE agent_id = ?
              ORDER BY strength DESC, id DESC LIMIT ?",
        )
        .bind(agent_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Append a trait delta to the ledger.
    ///
    /// `raw_value` is the unclamped trait value after the drift; the
    /// ledger records the soft-clamped result and returns it so the agent
    /// can mirror it in memory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn append_trait_delta(
        &self,
        agent_id: &AgentId,
        trait_name: TraitName,
        delta: f64,
        reason: &str,
        raw_value: f64,
    ) -> Result<f64, DbError> {
        let clamped = sigmoid_clamp(raw_value);
        sqlx::query(
            r"INSERT INTO trait_ledger (agent_id, trait_name, delta, reason, resulting_value, created_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(agent_id.as_str())
        .bind(trait_name.as_str())
        .bind(delta)
        .bind(reason)
        .bind(clamped)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        tracing::debug!(
            agent = %agent_id,
            trait_name = trait_name.as_str(),
            delta,
            clamped,
            "trait ledger append"
        );
        Ok(clamped)
    }

    /// Read the drift history of one trait, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn trait_history(
        &self,
        agent_id: &AgentId,
        trait_name: TraitName,
        limit: u32,
    ) -> Result<Vec<TraitDeltaRow>, DbError> {
        let rows = sqlx::query_as::<_, TraitDeltaRow>(
            r"SELECT id, agent_id, trait_name, delta, reason, resulting_value, created_at
              FROM trait_ledger WHERE agent_id = ? AND trait_name = ?
              ORDER BY id DESC LIMIT ?",
        )
        .bind(agent_id.as_str())
        .bind(trait_name.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::sqlite::Store;

    #[test]
    fn sigmoid_clamp_is_bounded() {
        for raw in [-100.0, -1.0, 0.0, 0.25, 0.5, 0.75, 1.0, 2.0, 100.0] {
            let clamped = sigmoid_clamp(raw);
            assert!(clamped >= TRAIT_FLOOR, "clamp({raw}) = {clamped}");
            assert!(clamped <= TRAIT_CEIL, "clamp({raw}) = {clamped}");
        }
    }

    #[test]
    fn sigmoid_clamp_is_centered() {
        assert!((sigmoid_clamp(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_clamp_is_monotone() {
        let mut prev = sigmoid_clamp(-2.0);
        let mut raw = -2.0;
        while raw < 2.0 {
            raw += 0.05;
            let next = sigmoid_clamp(raw);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn repeated_positive_drift_never_exits_bounds() {
        // Simulate an unbounded stream of same-signed drifts.
        let mut value: f64 = 0.5;
        for _ in 0..10_000 {
            value = sigmoid_clamp(value + 0.1);
            assert!(value <= TRAIT_CEIL);
        }
        // Approaches but does not reach the ceiling.
        assert!(value > 0.9);
    }

    #[tokio::test]
    async fn store_and_fetch_recent_memories() {
        let store = Store::open_in_memory().await.unwrap();
        let vault = MemoryVault::new(store.pool());
        let vera = AgentId::from("vera");

        for i in 0..5 {
            vault
                .store_memory(&vera, MemoryKind::Episodic, &format!("event {i}"), 0.6)
                .await
                .unwrap();
        }

        let recent = vault.recent_memories(&vera, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "event 4");
        assert_eq!(recent[0].kind, MemoryKind::Episodic);
    }

    #[tokio::test]
    async fn memory_strength_is_clamped_on_write() {
        let store = Store::open_in_memory().await.unwrap();
        let vault = MemoryVault::new(store.pool());
        let vera = AgentId::from("vera");

        vault
            .store_memory(&vera, MemoryKind::Social, "over-strong", 1.8)
            .await
            .unwrap();
        let rows = vault.recent_memories(&vera, 1).await.unwrap();
        assert!((rows[0].strength - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn beliefs_order_by_strength() {
        let store = Store::open_in_memory().await.unwrap();
        let vault = MemoryVault::new(store.pool());
        let vera = AgentId::from("vera");

        vault.save_belief(&vera, "weak belief", 0.3).await.unwrap();
        vault.save_belief(&vera, "strong belief", 0.9).await.unwrap();
        vault.save_belief(&vera, "medium belief", 0.7).await.unwrap();

        let beliefs = vault.top_beliefs(&vera, 2).await.unwrap();
        assert_eq!(beliefs.len(), 2);
        assert_eq!(beliefs[0].belief, "strong belief");
        assert_eq!(beliefs[1].belief, "medium belief");
    }

    #[tokio::test]
    async fn trait_ledger_records_clamped_values() {
        let store = Store::open_in_memory().await.unwrap();
        let vault = MemoryVault::new(store.pool());
        let vera = AgentId::from("vera");

        let clamped = vault
            .append_trait_delta(&vera, TraitName::Paranoia, 0.1, "threatened at the gate", 1.4)
            .await
            .unwrap();
        assert!(clamped <= TRAIT_CEIL);

        let history = vault
            .trait_history(&vera, TraitName::Paranoia, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "threatened at the gate");
        assert!((history[0].resulting_value - clamped).abs() < f64::EPSILON);
        assert!(history[0].resulting_value >= TRAIT_FLOOR);
        assert!(history[0].resulting_value <= TRAIT_CEIL);
    }
}
