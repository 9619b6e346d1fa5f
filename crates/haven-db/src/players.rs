//! Player sessions, per-(player, agent) reputation and the action log.
//!
//! A player session is created on first reference. Reputation edges are
//! updated by clamped addition into `[-1,1]`; after every successful
//! update the player's global reputation is recomputed as the arithmetic
//! mean of their edges, so the two can never drift apart.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, PlayerId};
use sqlx::SqlitePool;

use crate::error::DbError;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `players` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct PlayerRow {
    /// Player identifier.
    #[sqlx(try_from = "String")]
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// First time this player was referenced.
    pub first_seen: DateTime<Utc>,
    /// Most recent interaction time.
    pub last_seen: DateTime<Utc>,
    /// Total interaction count across all agents.
    pub interactions: i64,
    /// Global reputation: mean of the player's per-agent edges.
    pub reputation: f64,
}

/// A row from the `reputations` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct ReputationEdgeRow {
    /// The player side of the edge.
    #[sqlx(try_from = "String")]
    pub player_id: PlayerId,
    /// The agent side of the edge.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Reputation in `[-1,1]`.
    pub reputation: f64,
    /// Interactions along this edge.
    pub interactions: i64,
    /// Last interaction time.
    pub last_interaction: DateTime<Utc>,
}

/// A row from the `action_log` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct ActionLogRow {
    /// Row id.
    pub id: i64,
    /// Acting player.
    #[sqlx(try_from = "String")]
    pub player_id: PlayerId,
    /// Responding agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// The player's action text.
    pub action: String,
    /// The agent's spoken response.
    pub response: String,
    /// Reputation change applied with this action.
    pub reputation_delta: f64,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PlayerStore
// ---------------------------------------------------------------------------

/// Typed operations on the `players`, `reputations` and `action_log` tables.
pub struct PlayerStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PlayerStore<'a> {
    /// Create a player store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the player session if it does not exist and refresh
    /// `last_seen`. Returns the current row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn ensure_player(
        &self,
        player_id: &PlayerId,
        name: Option<&str>,
    ) -> Result<PlayerRow, DbError> {
        let now = Utc::now();
        sqlx::query(
            r"INSERT INTO players (id, name, first_seen, last_seen, interactions, reputation)
              VALUES (?, ?, ?, ?, 0, 0.0)
              ON CONFLICT (id) DO UPDATE SET
                last_seen = excluded.last_seen,
                name = CASE WHEN excluded.name != '' THEN excluded.name ELSE players.name END",
        )
        .bind(player_id.as_str())
        .bind(name.unwrap_or(""))
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get_player(player_id).await
    }

    /// Fetch a player session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown player.
    pub async fn get_player(&self, player_id: &PlayerId) -> Result<PlayerRow, DbError> {
        sqlx::query_as::<_, PlayerRow>("SELECT * FROM players WHERE id = ?")
            .bind(player_id.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("player {player_id}")))
    }

    /// List player sessions, most recently seen first.
    ///
    /// Returns the page plus the total row count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_players(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<PlayerRow>, u64), DbError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT * FROM players ORDER BY last_seen DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM players")
            .fetch_one(self.pool)
            .await?;
        Ok((rows, total.0.max(0) as u64))
    }

    /// The reputation of a player with one agent (0.0 if never met).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn reputation_of(
        &self,
        player_id: &PlayerId,
        agent_id: &AgentId,
    ) -> Result<f64, DbError> {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT reputation FROM reputations WHERE player_id = ? AND agent_id = ?",
        )
        .bind(player_id.as_str())
        .bind(agent_id.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map_or(0.0, |(r,)| r))
    }

    /// Apply a reputation delta on the `(player, agent)` edge, clamped
    /// into `[-1,1]`, then recompute the player's global reputation as
    /// the mean of their edges. Returns the edge's new value.
    ///
    /// This is the single write path for reputation: the resolved
    /// `trust_mod` of a reactive cycle lands here exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn update_reputation(
        &self,
        player_id: &PlayerId,
        agent_id: &AgentId,
        delta: f64,
    ) -> Result<f64, DbError> {
        let current = self.reputation_of(player_id, agent_id).await?;
        let updated = (current + delta).clamp(-1.0, 1.0);
        let now = Utc::now();

        sqlx::query(
            r"INSERT INTO reputations (player_id, agent_id, reputation, interactions, last_interaction)
              VALUES (?, ?, ?, 1, ?)
              ON CONFLICT (player_id, agent_id) DO UPDATE SET
                reputation = excluded.reputation,
                interactions = reputations.interactions + 1,
                last_interaction = excluded.last_interaction",
        )
        .bind(player_id.as_str())
        .bind(agent_id.as_str())
        .bind(updated)
        .bind(now)
        .execute(self.pool)
        .await?;

        sqlx::query(
            r"UPDATE players
              SET reputation = (SELECT AVG(reputation) FROM reputations WHERE player_id = ?)
              WHERE id = ?",
        )
        .bind(player_id.as_str())
        .bind(player_id.as_str())
        .execute(self.pool)
        .await?;

        Ok(updated)
    }

    /// All reputation edges of one player.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn edges_for(&self, player_id: &PlayerId) -> Result<Vec<ReputationEdgeRow>, DbError> {
        let rows = sqlx::query_as::<_, ReputationEdgeRow>(
            "SELECT * FROM reputations WHERE player_id = ? ORDER BY agent_id",
        )
        .bind(player_id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Append an interaction to the action log and bump the player's
    /// interaction counter.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn log_action(
        &self,
        player_id: &PlayerId,
        agent_id: &AgentId,
        action: &str,
        response: &str,
        reputation_delta: f64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO action_log (player_id, agent_id, action, response, reputation_delta, created_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(player_id.as_str())
        .bind(agent_id.as_str())
        .bind(action)
        .bind(response)
        .bind(reputation_delta)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        sqlx::query("UPDATE players SET interactions = interactions + 1 WHERE id = ?")
            .bind(player_id.as_str())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Recent action-log entries for a player, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn action_history(
        &self,
        player_id: &PlayerId,
        limit: u32,
    ) -> Result<Vec<ActionLogRow>, DbError> {
        let rows = sqlx::query_as::<_, ActionLogRow>(
            "SELECT * FROM action_log WHERE player_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(player_id.as_str())
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

    fn p1() -> PlayerId {
        PlayerId::from("p1")
    }

    #[tokio::test]
    async fn first_reference_creates_session() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());

        let row = players.ensure_player(&p1(), Some("Rook")).await.unwrap();
        assert_eq!(row.name, "Rook");
        assert_eq!(row.interactions, 0);
        assert!(row.reputation.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn ensure_player_is_idempotent_and_keeps_name() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());

        players.ensure_player(&p1(), Some("Rook")).await.unwrap();
        let row = players.ensure_player(&p1(), None).await.unwrap();
        assert_eq!(row.name, "Rook");
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());
        let result = players.get_player(&PlayerId::from("ghost")).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn reputation_clamps_and_global_is_mean_of_edges() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());
        players.ensure_player(&p1(), None).await.unwrap();

        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");

        // Push far beyond the ceiling: clamped to 1.0.
        for _ in 0..30 {
            players.update_reputation(&p1(), &vera, 0.1).await.unwrap();
        }
        let vera_edge = players.reputation_of(&p1(), &vera).await.unwrap();
        assert!((vera_edge - 1.0).abs() < 1e-9);

        players.update_reputation(&p1(), &garrick, -0.5).await.unwrap();

        let row = players.get_player(&p1()).await.unwrap();
        let edges = players.edges_for(&p1()).await.unwrap();
        assert_eq!(edges.len(), 2);
        let mean = edges.iter().map(|e| e.reputation).sum::<f64>() / edges.len() as f64;
        assert!((row.reputation - mean).abs() < 1e-9);
    }

    #[tokio::test]
    async fn negative_reputation_clamps_at_floor() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());
        players.ensure_player(&p1(), None).await.unwrap();

        let vera = AgentId::from("vera");
        for _ in 0..30 {
            players.update_reputation(&p1(), &vera, -0.1).await.unwrap();
        }
        let edge = players.reputation_of(&p1(), &vera).await.unwrap();
        assert!((edge + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn action_log_appends_and_counts() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());
        players.ensure_player(&p1(), None).await.unwrap();

        let vera = AgentId::from("vera");
        players
            .log_action(&p1(), &vera, "waved", "nodded back", 0.01)
            .await
            .unwrap();
        players
            .log_action(&p1(), &vera, "drew a blade", "stepped back", -0.05)
            .await
            .unwrap();

        let history = players.action_history(&p1(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "drew a blade");

        let row = players.get_player(&p1()).await.unwrap();
        assert_eq!(row.interactions, 2);
    }

    #[tokio::test]
    async fn pagination_reports_totals() {
        let store = Store::open_in_memory().await.unwrap();
        let players = PlayerStore::new(store.pool());
        for i in 0..7 {
            players
                .ensure_player(&PlayerId::from(format!("p{i}").as_str()), None)
                .await
                .unwrap();
        }
        let (page, total) = players.list_players(2, 3).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(total, 7);
    }
}
