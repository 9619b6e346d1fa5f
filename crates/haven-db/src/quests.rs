//! Quest, quest-chain and goal records with their status machines.
//!
//! Transitions enforced here:
//!
//! - quest: `available -> active -> completed | failed`, `available -> expired`
//! - chain: `available -> in_progress -> completed`
//! - goal:  `active -> completed | abandoned`, progress monotone in `[0,1]`
//!
//! Invalid transitions surface as [`DbError::Conflict`] and change nothing.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, ChainId, ChainStatus, GoalId, GoalStatus, PlayerId, QuestId, QuestStatus};
use sqlx::SqlitePool;

use crate::error::DbError;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `quests` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct QuestRow {
    /// Quest identifier.
    #[sqlx(try_from = "String")]
    pub id: QuestId,
    /// The agent offering the quest.
    #[sqlx(try_from = "String")]
    pub giver_agent: AgentId,
    /// The player bound on acceptance.
    pub player_id: Option<String>,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Gold reward on completion.
    pub reward_gold: i64,
    /// Reputation reward on completion.
    pub reward_reputation: f64,
    /// Optional item reward.
    pub reward_item: Option<String>,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub status: QuestStatus,
    /// Deadline for acceptance.
    pub deadline: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A row from the `quest_chains` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct ChainRow {
    /// Chain identifier.
    #[sqlx(try_from = "String")]
    pub id: ChainId,
    /// The agent the chain belongs to.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Chain name.
    pub name: String,
    /// Ordered step descriptions.
    #[sqlx(json)]
    pub steps: Vec<String>,
    /// Index of the current step.
    pub cursor: i64,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub status: ChainStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One sub-step of a goal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GoalStep {
    /// What the step is.
    pub description: String,
    /// Whether the step has been finished.
    pub done: bool,
}

/// A row from the `goals` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct GoalRow {
    /// Goal identifier.
    #[sqlx(try_from = "String")]
    pub id: GoalId,
    /// The pursuing agent.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Faction context, if any.
    pub faction: Option<String>,
    /// Goal kind ("patrol", "stockpile", "recruit", ...).
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Monotone non-decreasing progress in `[0,1]`.
    pub progress: f64,
    /// Fixed-length sub-step list.
    #[sqlx(json)]
    pub steps: Vec<GoalStep>,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub status: GoalStatus,
    /// Gold credited on completion.
    pub reward_gold: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// QuestStore
// ---------------------------------------------------------------------------

/// Typed operations on the `quests`, `quest_chains` and `goals` tables.
pub struct QuestStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuestStore<'a> {
    /// Create a quest store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Quests
    // -----------------------------------------------------------------------

    /// Persist a freshly generated quest in `available` status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_quest(
        &self,
        giver: &AgentId,
        title: &str,
        description: &str,
        reward_gold: i64,
        reward_reputation: f64,
        reward_item: Option<&str>,
        deadline: DateTime<Utc>,
    ) -> Result<QuestRow, DbError> {
        let id = QuestId::new();
        sqlx::query(
            r"INSERT INTO quests
                (id, giver_agent, player_id, title, description, reward_gold,
                 reward_reputation, reward_item, status, deadline, created_at)
              VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(giver.as_str())
        .bind(title)
        .bind(description)
        .bind(reward_gold)
        .bind(reward_reputation)
        .bind(reward_item)
        .bind(QuestStatus::Available.as_str())
        .bind(deadline)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_quest(id).await
    }

    /// Fetch one quest.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown quest.
    pub async fn get_quest(&self, id: QuestId) -> Result<QuestRow, DbError> {
        sqlx::query_as::<_, QuestRow>("SELECT * FROM quests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("quest {id}")))
    }

    /// Accept a quest: atomically moves `available -> active` and binds
    /// the player.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown quest.
    /// - [`DbError::Conflict`] if the quest is not available.
    pub async fn accept(&self, id: QuestId, player: &PlayerId) -> Result<QuestRow, DbError> {
        let result = sqlx::query(
            "UPDATE quests SET status = ?, player_id = ? WHERE id = ? AND status = ?",
        )
        .bind(QuestStatus::Active.as_str())
        .bind(player.as_str())
        .bind(id.to_string())
        .bind(QuestStatus::Available.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let quest = self.get_quest(id).await?;
            return Err(DbError::Conflict(format!(
                "quest {id} is {} and cannot be accepted",
                quest.status.as_str()
            )));
        }
        self.get_quest(id).await
    }

    /// Complete an active quest. The returned row carries the rewards
    /// the caller must credit.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown quest.
    /// - [`DbError::Conflict`] if the quest is not active.
    pub async fn complete(&self, id: QuestId) -> Result<QuestRow, DbError> {
        let result = sqlx::query("UPDATE quests SET status = ? WHERE id = ? AND status = ?")
            .bind(QuestStatus::Completed.as_str())
            .bind(id.to_string())
            .bind(QuestStatus::Active.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let quest = self.get_quest(id).await?;
            return Err(DbError::Conflict(format!(
                "quest {id} is {} and cannot be completed",
                quest.status.as_str()
            )));
        }
        self.get_quest(id).await
    }

    /// Fail an active quest.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown quest.
    /// - [`DbError::Conflict`] if the quest is not active.
    pub async fn fail(&self, id: QuestId) -> Result<QuestRow, DbError> {
        let result = sqlx::query("UPDATE quests SET status = ? WHERE id = ? AND status = ?")
            .bind(QuestStatus::Failed.as_str())
            .bind(id.to_string())
            .bind(QuestStatus::Active.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let quest = self.get_quest(id).await?;
            return Err(DbError::Conflict(format!(
                "quest {id} is {} and cannot fail",
                quest.status.as_str()
            )));
        }
        self.get_quest(id).await
    }

    /// Expire every available quest whose deadline has passed.
    /// Returns how many were expired.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the write fails.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE quests SET status = ? WHERE status = ? AND deadline < ?",
        )
        .bind(QuestStatus::Expired.as_str())
        .bind(QuestStatus::Available.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List quests filtered by status, giver and player.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_quests(
        &self,
        status: Option<QuestStatus>,
        giver: Option<&AgentId>,
        player: Option<&PlayerId>,
    ) -> Result<Vec<QuestRow>, DbError> {
        let rows = sqlx::query_as::<_, QuestRow>(
            r"SELECT * FROM quests
              WHERE (? IS NULL OR status = ?)
                AND (? IS NULL OR giver_agent = ?)
                AND (? IS NULL OR player_id = ?)
              ORDER BY created_at DESC",
        )
        .bind(status.map(QuestStatus::as_str))
        .bind(status.map(QuestStatus::as_str))
        .bind(giver.map(AgentId::as_str))
        .bind(giver.map(AgentId::as_str))
        .bind(player.map(PlayerId::as_str))
        .bind(player.map(PlayerId::as_str))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Page through quests, newest first. Returns the page plus the total.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn paginated_quests(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<QuestRow>, u64), DbError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = sqlx::query_as::<_, QuestRow>(
            "SELECT * FROM quests ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quests")
            .fetch_one(self.pool)
            .await?;
        Ok((rows, total.0.max(0) as u64))
    }

    // -----------------------------------------------------------------------
    // Quest chains
    // -----------------------------------------------------------------------

    /// Create a quest chain in `available` status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn create_chain(
        &self,
        agent: &AgentId,
        name: &str,
        steps: &[String],
    ) -> Result<ChainRow, DbError> {
        let id = ChainId::new();
        sqlx::query(
            r"INSERT INTO quest_chains (id, agent_id, name, steps, cursor, status, created_at)
              VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id.to_string())
        .bind(agent.as_str())
        .bind(name)
        .bind(serde_json::to_string(steps)?)
        .bind(ChainStatus::Available.as_str())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_chain(id).await
    }

    /// Fetch one chain.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown chain.
    pub async fn get_chain(&self, id: ChainId) -> Result<ChainRow, DbError> {
        sqlx::query_as::<_, ChainRow>("SELECT * FROM quest_chains WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("quest chain {id}")))
    }

    /// List all chains, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_chains(&self) -> Result<Vec<ChainRow>, DbError> {
        let rows = sqlx::query_as::<_, ChainRow>(
            "SELECT * FROM quest_chains ORDER BY created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Start a chain: `available -> in_progress`.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown chain.
    /// - [`DbError::Conflict`] if the chain is not available.
    pub async fn start_chain(&self, id: ChainId) -> Result<ChainRow, DbError> {
        let result = sqlx::query("UPDATE quest_chains SET status = ? WHERE id = ? AND status = ?")
            .bind(ChainStatus::InProgress.as_str())
            .bind(id.to_string())
            .bind(ChainStatus::Available.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let chain = self.get_chain(id).await?;
            return Err(DbError::Conflict(format!(
                "chain {id} is {} and cannot start",
                chain.status.as_str()
            )));
        }
        self.get_chain(id).await
    }

    /// Advance a chain's cursor by one; completes on overflow.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown chain.
    /// - [`DbError::Conflict`] if the chain is not in progress.
    pub async fn advance_chain(&self, id: ChainId) -> Result<ChainRow, DbError> {
        let chain = self.get_chain(id).await?;
        if chain.status != ChainStatus::InProgress {
            return Err(DbError::Conflict(format!(
                "chain {id} is {} and cannot advance",
                chain.status.as_str()
            )));
        }

        let next = chain.cursor + 1;
        let status = if next >= chain.steps.len() as i64 {
            ChainStatus::Completed
        } else {
            ChainStatus::InProgress
        };

        sqlx::query("UPDATE quest_chains SET cursor = ?, status = ? WHERE id = ?")
            .bind(next)
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        self.get_chain(id).await
    }

    // -----------------------------------------------------------------------
    // Goals
    // -----------------------------------------------------------------------

    /// Create an active goal with zero progress.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn create_goal(
        &self,
        agent: &AgentId,
        faction: Option<&str>,
        kind: &str,
        description: &str,
        steps: &[String],
        reward_gold: i64,
    ) -> Result<GoalRow, DbError> {
        let id = GoalId::new();
        let steps: Vec<GoalStep> = steps
            .iter()
            .map(|s| GoalStep {
                description: s.clone(),
                done: false,
            })
            .collect();

        sqlx::query(
            r"INSERT INTO goals
                (id, agent_id, faction, kind, description, progress, steps, status, reward_gold, created_at)
              VALUES (?, ?, ?, ?, ?, 0.0, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(agent.as_str())
        .bind(faction)
        .bind(kind)
        .bind(description)
        .bind(serde_json::to_string(&steps)?)
        .bind(GoalStatus::Active.as_str())
        .bind(reward_gold)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_goal(id).await
    }

    /// Fetch one goal.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown goal.
    pub async fn get_goal(&self, id: GoalId) -> Result<GoalRow, DbError> {
        sqlx::query_as::<_, GoalRow>("SELECT * FROM goals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("goal {id}")))
    }

    /// Goals of one agent, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn goals_for(
        &self,
        agent: &AgentId,
        status: Option<GoalStatus>,
    ) -> Result<Vec<GoalRow>, DbError> {
        let rows = sqlx::query_as::<_, GoalRow>(
            r"SELECT * FROM goals
              WHERE agent_id = ? AND (? IS NULL OR status = ?)
              ORDER BY created_at DESC",
        )
        .bind(agent.as_str())
        .bind(status.map(GoalStatus::as_str))
        .bind(status.map(GoalStatus::as_str))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Add progress to an active goal. Progress is monotone: negative
    /// deltas are ignored. Steps are ticked off proportionally, and
    /// reaching 1.0 completes the goal.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown goal.
    /// - [`DbError::Conflict`] if the goal is not active.
    pub async fn progress_goal(&self, id: GoalId, delta: f64) -> Result<GoalRow, DbError> {
        let goal = self.get_goal(id).await?;
        if goal.status != GoalStatus::Active {
            return Err(DbError::Conflict(format!(
                "goal {id} is {} and cannot progress",
                goal.status.as_str()
            )));
        }

        let progress = (goal.progress + delta.max(0.0)).min(1.0);
        let mut steps = goal.steps;
        let done_count = (progress * steps.len() as f64).floor() as usize;
        for (i, step) in steps.iter_mut().enumerate() {
            if i < done_count {
                step.done = true;
            }
        }

        let status = if progress >= 1.0 {
            GoalStatus::Completed
        } else {
            GoalStatus::Active
        };

        sqlx::query("UPDATE goals SET progress = ?, steps = ?, status = ? WHERE id = ?")
            .bind(progress)
            .bind(serde_json::to_string(&steps)?)
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        self.get_goal(id).await
    }

    /// Abandon an active goal.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown goal.
    /// - [`DbError::Conflict`] if the goal is not active.
    pub async fn abandon_goal(&self, id: GoalId) -> Result<GoalRow, DbError> {
        let result = sqlx::query("UPDATE goals SET status = ? WHERE id = ? AND status = ?")
            .bind(GoalStatus::Abandoned.as_str())
            .bind(id.to_string())
            .bind(GoalStatus::Active.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let goal = self.get_goal(id).await?;
            return Err(DbError::Conflict(format!(
                "goal {id} is {} and cannot be abandoned",
                goal.status.as_str()
            )));
        }
        self.get_goal(id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::sqlite::Store;
    use chrono::Duration;

    fn vera() -> AgentId {
        AgentId::from("vera")
    }

    async fn make_quest(store: &Store) -> QuestRow {
        QuestStore::new(store.pool())
            .create_quest(
                &vera(),
                "Clear the ridge",
                "Drive the scavengers off the northern ridge.",
                50,
                0.1,
                None,
                Utc::now() + Duration::hours(24),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn quest_lifecycle_available_active_completed() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let quest = make_quest(&store).await;
        assert_eq!(quest.status, QuestStatus::Available);

        let player = PlayerId::from("p1");
        let accepted = quests.accept(quest.id, &player).await.unwrap();
        assert_eq!(accepted.status, QuestStatus::Active);
        assert_eq!(accepted.player_id.as_deref(), Some("p1"));

        let completed = quests.complete(quest.id).await.unwrap();
        assert_eq!(completed.status, QuestStatus::Completed);
        assert_eq!(completed.reward_gold, 50);
    }

    #[tokio::test]
    async fn double_accept_is_a_conflict() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let quest = make_quest(&store).await;

        let player = PlayerId::from("p1");
        quests.accept(quest.id, &player).await.unwrap();
        let again = quests.accept(quest.id, &PlayerId::from("p2")).await;
        assert!(matches!(again, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn completing_an_available_quest_is_a_conflict() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let quest = make_quest(&store).await;
        let result = quests.complete(quest.id).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn stale_available_quests_expire() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let quest = make_quest(&store).await;

        let expired = quests
            .expire_stale(Utc::now() + Duration::hours(48))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        let row = quests.get_quest(quest.id).await.unwrap();
        assert_eq!(row.status, QuestStatus::Expired);

        // Accepted quests do not expire.
        let second = make_quest(&store).await;
        quests.accept(second.id, &PlayerId::from("p1")).await.unwrap();
        let expired = quests
            .expire_stale(Utc::now() + Duration::hours(48))
            .await
            .unwrap();
        assert_eq!(expired, 0);
    }

    #[tokio::test]
    async fn chain_advances_and_completes_on_overflow() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let chain = quests
            .create_chain(
                &vera(),
                "Gate watch",
                &["meet the captain".to_owned(), "stand first watch".to_owned()],
            )
            .await
            .unwrap();
        assert_eq!(chain.status, ChainStatus::Available);

        let started = quests.start_chain(chain.id).await.unwrap();
        assert_eq!(started.status, ChainStatus::InProgress);

        let mid = quests.advance_chain(chain.id).await.unwrap();
        assert_eq!(mid.cursor, 1);
        assert_eq!(mid.status, ChainStatus::InProgress);

        let done = quests.advance_chain(chain.id).await.unwrap();
        assert_eq!(done.status, ChainStatus::Completed);

        let over = quests.advance_chain(chain.id).await;
        assert!(matches!(over, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn goal_progress_is_monotone_and_completes() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let goal = quests
            .create_goal(
                &vera(),
                Some("guards"),
                "patrol",
                "Walk the perimeter nightly.",
                &["north wall".to_owned(), "south wall".to_owned()],
                20,
            )
            .await
            .unwrap();

        let half = quests.progress_goal(goal.id, 0.5).await.unwrap();
        assert!((half.progress - 0.5).abs() < 1e-9);
        assert!(half.steps[0].done);
        assert!(!half.steps[1].done);

        // Negative deltas are ignored.
        let same = quests.progress_goal(goal.id, -0.4).await.unwrap();
        assert!((same.progress - 0.5).abs() < 1e-9);

        let done = quests.progress_goal(goal.id, 0.6).await.unwrap();
        assert_eq!(done.status, GoalStatus::Completed);
        assert!((done.progress - 1.0).abs() < 1e-9);
        assert!(done.steps.iter().all(|s| s.done));
    }

    #[tokio::test]
    async fn abandoned_goal_cannot_progress() {
        let store = Store::open_in_memory().await.unwrap();
        let quests = QuestStore::new(store.pool());
        let goal = quests
            .create_goal(&vera(), None, "stockpile", "Gather supplies.", &[], 0)
            .await
            .unwrap();

        quests.abandon_goal(goal.id).await.unwrap();
        let result = quests.progress_goal(goal.id, 0.1).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }
}
