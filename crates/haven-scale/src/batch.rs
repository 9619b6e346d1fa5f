//! Batched write coalescing.
//!
//! Writes queue up in memory and flush in one transaction when the
//! queue reaches its threshold (default 100) or on explicit flush. A
//! failed flush rolls the whole transaction back and propagates the
//! error; nothing is retried automatically -- the caller decides.
//!
//! Queries against the same tables run against a consistent pre- or
//! post-flush snapshot, never mid-batch, because the batch shares one
//! transaction.

use chrono::Utc;
use haven_db::DbError;
use haven_types::{AgentId, MemoryId, MemoryKind, PlayerId};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

/// Default queue size that triggers an automatic flush.
const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// One queued write.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// An agent memory insert.
    Memory {
        /// Owning agent.
        agent_id: AgentId,
        /// Memory kind.
        kind: MemoryKind,
        /// Content string.
        content: String,
        /// Strength in `[0,1]`.
        strength: f64,
    },
    /// An action-log append.
    ActionLog {
        /// Acting player.
        player_id: PlayerId,
        /// Responding agent.
        agent_id: AgentId,
        /// Action text.
        action: String,
        /// Response text.
        response: String,
        /// Reputation change applied.
        reputation_delta: f64,
    },
    /// A summary-belief insert.
    Belief {
        /// Owning agent.
        agent_id: AgentId,
        /// Belief sentence.
        belief: String,
        /// Strength in `[0,1]`.
        strength: f64,
    },
}

/// Per-agent aggregate returned by the multi-agent stat query.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct AgentStats {
    /// The agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Stored memory count.
    pub memory_count: i64,
    /// Average memory strength.
    pub avg_strength: f64,
}

/// Coalesces writes and flushes them in a single transaction.
pub struct BatchWriter {
    pool: SqlitePool,
    queue: Mutex<Vec<PendingWrite>>,
    threshold: usize,
}

impl BatchWriter {
    /// Create a writer with the default flush threshold (100).
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_threshold(pool, DEFAULT_FLUSH_THRESHOLD)
    }

    /// Create a writer with an explicit flush threshold.
    pub fn with_threshold(pool: SqlitePool, threshold: usize) -> Self {
        Self {
            pool,
            queue: Mutex::new(Vec::new()),
            threshold: threshold.max(1),
        }
    }

    /// Queue a write. Triggers a flush when the queue reaches the
    /// threshold; the flush error, if any, propagates to this caller.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a threshold-triggered flush fails.
    pub async fn queue(&self, write: PendingWrite) -> Result<(), DbError> {
        let should_flush = {
            let mut queue = self.queue.lock().await;
            queue.push(write);
            queue.len() >= self.threshold
        };
        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    /// Number of writes currently queued.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Flush every queued write inside one transaction.
    ///
    /// On error the transaction rolls back, the queued writes are
    /// dropped, and the error propagates. Returns how many writes were
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement or the commit fails.
    pub async fn flush(&self) -> Result<usize, DbError> {
        let writes: Vec<PendingWrite> = {
            let mut queue = self.queue.lock().await;
            std::mem::take(&mut *queue)
        };
        if writes.is_empty() {
            return Ok(0);
        }

        let count = writes.len();
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for write in &writes {
            match write {
                PendingWrite::Memory {
                    agent_id,
                    kind,
                    content,
                    strength,
                } => {
                    sqlx::query(
                        r"INSERT INTO memories (id, agent_id, kind, content, strength, created_at)
                          VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(MemoryId::new().to_string())
                    .bind(agent_id.as_str())
                    .bind(kind.as_str())
                    .bind(content)
                    .bind(strength.clamp(0.0, 1.0))
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingWrite::ActionLog {
                    player_id,
                    agent_id,
                    action,
                    response,
                    reputation_delta,
                } => {
                    sqlx::query(
                        r"INSERT INTO action_log
                            (player_id, agent_id, action, response, reputation_delta, created_at)
                          VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(player_id.as_str())
                    .bind(agent_id.as_str())
                    .bind(action)
                    .bind(response)
                    .bind(reputation_delta)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingWrite::Belief {
                    agent_id,
                    belief,
                    strength,
                } => {
                    sqlx::query(
                        r"INSERT INTO beliefs (agent_id, belief, strength, created_at)
                          VALUES (?, ?, ?, ?)",
                    )
                    .bind(agent_id.as_str())
                    .bind(belief)
                    .bind(strength.clamp(0.0, 1.0))
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(count, "batch flush committed");
        Ok(count)
    }

    /// Aggregate memory stats for a set of agents in one query.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn agent_stats(&self, agent_ids: &[AgentId]) -> Result<Vec<AgentStats>, DbError> {
        if agent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; agent_ids.len()].join(", ");
        let sql = format!(
            r"SELECT agent_id, COUNT(*) AS memory_count, AVG(strength) AS avg_strength
              FROM memories WHERE agent_id IN ({placeholders})
              GROUP BY agent_id ORDER BY agent_id"
        );
        let mut query = sqlx::query_as::<_, AgentStats>(&sql);
        for id in agent_ids {
            query = query.bind(id.as_str());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use haven_db::{MemoryVault, Store};

    fn memory_write(agent: &str, content: &str) -> PendingWrite {
        PendingWrite::Memory {
            agent_id: AgentId::from(agent),
            kind: MemoryKind::Episodic,
            content: content.to_owned(),
            strength: 0.6,
        }
    }

    #[tokio::test]
    async fn writes_stay_queued_below_threshold() {
        let store = Store::open_in_memory().await.unwrap();
        let writer = BatchWriter::with_threshold(store.pool().clone(), 10);

        writer.queue(memory_write("vera", "one")).await.unwrap();
        writer.queue(memory_write("vera", "two")).await.unwrap();
        assert_eq!(writer.pending().await, 2);

        // Nothing visible until flush.
        let vault = MemoryVault::new(store.pool());
        assert!(vault
            .recent_memories(&AgentId::from("vera"), 10)
            .await
            .unwrap()
            .is_empty());

        let flushed = writer.flush().await.unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(writer.pending().await, 0);
        assert_eq!(
            vault
                .recent_memories(&AgentId::from("vera"), 10)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn threshold_triggers_automatic_flush() {
        let store = Store::open_in_memory().await.unwrap();
        let writer = BatchWriter::with_threshold(store.pool().clone(), 3);

        writer.queue(memory_write("vera", "one")).await.unwrap();
        writer.queue(memory_write("vera", "two")).await.unwrap();
        assert_eq!(writer.pending().await, 2);
        writer.queue(memory_write("vera", "three")).await.unwrap();
        assert_eq!(writer.pending().await, 0);

        let vault = MemoryVault::new(store.pool());
        assert_eq!(
            vault
                .recent_memories(&AgentId::from("vera"), 10)
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn mixed_write_kinds_flush_together() {
        let store = Store::open_in_memory().await.unwrap();
        let writer = BatchWriter::new(store.pool().clone());

        writer.queue(memory_write("vera", "one")).await.unwrap();
        writer
            .queue(PendingWrite::Belief {
                agent_id: AgentId::from("vera"),
                belief: "The gate must hold".to_owned(),
                strength: 0.7,
            })
            .await
            .unwrap();
        writer
            .queue(PendingWrite::ActionLog {
                player_id: PlayerId::from("p1"),
                agent_id: AgentId::from("vera"),
                action: "waved".to_owned(),
                response: "nodded".to_owned(),
                reputation_delta: 0.01,
            })
            .await
            .unwrap();

        assert_eq!(writer.flush().await.unwrap(), 3);

        let vault = MemoryVault::new(store.pool());
        assert_eq!(
            vault
                .top_beliefs(&AgentId::from("vera"), 5)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn empty_flush_is_a_noop() {
        let store = Store::open_in_memory().await.unwrap();
        let writer = BatchWriter::new(store.pool().clone());
        assert_eq!(writer.flush().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn agent_stats_aggregates_per_agent() {
        let store = Store::open_in_memory().await.unwrap();
        let writer = BatchWriter::new(store.pool().clone());
        writer.queue(memory_write("vera", "one")).await.unwrap();
        writer.queue(memory_write("vera", "two")).await.unwrap();
        writer.queue(memory_write("garrick", "three")).await.unwrap();
        writer.flush().await.unwrap();

        let stats = writer
            .agent_stats(&[AgentId::from("vera"), AgentId::from("garrick")])
            .await
            .unwrap();
        assert_eq!(stats.len(), 2);
        let vera = stats.iter().find(|s| s.agent_id.as_str() == "vera").unwrap();
        assert_eq!(vera.memory_count, 2);
        assert!((vera.avg_strength - 0.6).abs() < 1e-9);
    }
}
