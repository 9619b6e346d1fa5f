//! Rumor graph: authored hearsay about players, spread agent-to-agent.
//!
//! A rumor is authored by the responding agent after an interaction; its
//! text comes from a template keyed by the outcome's polarity and its
//! truthfulness is sampled in `[0.7, 1.0]`. Spreading to a listener is
//! idempotent per `(listener, rumor)`: the first spread samples a belief
//! in `[0.5, 0.9]` and bumps the spread counter, any repeat is a no-op.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, PlayerId, RumorId};
use rand::Rng;
use sqlx::SqlitePool;

use crate::error::DbError;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Rumor templates for players who behaved well. `{player}` is
/// substituted with the player's id.
const POSITIVE_TEMPLATES: &[&str] = &[
    "{player} helped out at the gates without asking anything in return",
    "{player} is said to keep their word",
    "I hear {player} shared supplies with the wounded",
];

/// Rumor templates for players who caused trouble.
const NEGATIVE_TEMPLATES: &[&str] = &[
    "{player} drew steel on a guard, watch yourself",
    "they say {player} can't be trusted with anything valuable",
    "{player} has been asking questions no honest traveler would ask",
];

/// Rumor templates for unremarkable encounters.
const NEUTRAL_TEMPLATES: &[&str] = &[
    "{player} passed through recently, kept to themselves",
    "someone named {player} has been seen around the settlement",
];

/// Polarity of the interaction outcome a rumor is authored from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RumorPolarity {
    /// Trust went up.
    Positive,
    /// Trust went down.
    Negative,
    /// No meaningful trust change.
    Neutral,
}

impl RumorPolarity {
    /// Derive the polarity from a resolved trust delta.
    pub fn from_trust_delta(delta: f64) -> Self {
        if delta > 0.01 {
            Self::Positive
        } else if delta < -0.01 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    const fn templates(self) -> &'static [&'static str] {
        match self {
            Self::Positive => POSITIVE_TEMPLATES,
            Self::Negative => NEGATIVE_TEMPLATES,
            Self::Neutral => NEUTRAL_TEMPLATES,
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `rumors` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct RumorRow {
    /// Rumor identifier.
    #[sqlx(try_from = "String")]
    pub id: RumorId,
    /// The player the rumor is about.
    #[sqlx(try_from = "String")]
    pub about_player: PlayerId,
    /// The rumor text.
    pub content: String,
    /// Truthfulness in `[0.7, 1.0]` at authoring time.
    pub truthfulness: f64,
    /// How many listeners the rumor has reached beyond its author.
    pub spread_count: i64,
    /// Who authored it.
    #[sqlx(try_from = "String")]
    pub author_agent: AgentId,
    /// When it was authored.
    pub created_at: DateTime<Utc>,
}

/// A rumor together with one listener's belief in it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct HeardRumorRow {
    /// Rumor identifier.
    #[sqlx(try_from = "String")]
    pub id: RumorId,
    /// The player the rumor is about.
    #[sqlx(try_from = "String")]
    pub about_player: PlayerId,
    /// The rumor text.
    pub content: String,
    /// Truthfulness of the rumor.
    pub truthfulness: f64,
    /// The listener's belief in `[0,1]`.
    pub belief: f64,
}

// ---------------------------------------------------------------------------
// RumorStore
// ---------------------------------------------------------------------------

/// Typed operations on the `rumors` and `rumor_beliefs` tables.
pub struct RumorStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RumorStore<'a> {
    /// Create a rumor store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Author a rumor about a player.
    ///
    /// The text is chosen from the polarity's template set, truthfulness
    /// is sampled uniformly in `[0.7, 1.0]`, and the author's own
    /// knowledge is registered with belief 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn author_rumor(
        &self,
        author: &AgentId,
        about: &PlayerId,
        polarity: RumorPolarity,
    ) -> Result<RumorRow, DbError> {
        let (content, truthfulness) = {
            let mut rng = rand::rng();
            let templates = polarity.templates();
            let template = templates[rng.random_range(0..templates.len())];
            (
                template.replace("{player}", about.as_str()),
                rng.random_range(0.7..=1.0),
            )
        };

        let id = RumorId::new();
        let now = Utc::now();
        sqlx::query(
            r"INSERT INTO rumors (id, about_player, content, truthfulness, spread_count, author_agent, created_at)
              VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id.to_string())
        .bind(about.as_str())
        .bind(&content)
        .bind(truthfulness)
        .bind(author.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;

        sqlx::query(
            r"INSERT INTO rumor_beliefs (rumor_id, agent_id, belief, heard_at) VALUES (?, ?, 1.0, ?)",
        )
        .bind(id.to_string())
        .bind(author.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;

        tracing::debug!(rumor = %id, author = %author, about = %about, "rumor authored");
        self.get_rumor(id).await
    }

    /// Fetch one rumor.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown rumor.
    pub async fn get_rumor(&self, rumor_id: RumorId) -> Result<RumorRow, DbError> {
        sqlx::query_as::<_, RumorRow>("SELECT * FROM rumors WHERE id = ?")
            .bind(rumor_id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("rumor {rumor_id}")))
    }

    /// Spread a rumor to a listener.
    ///
    /// Idempotent per `(listener, rumor)`: the first spread samples a
    /// belief in `[0.5, 0.9]` and increments the rumor's spread counter;
    /// repeats change nothing. Returns `true` when the listener was new.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown rumor.
    pub async fn spread(&self, rumor_id: RumorId, listener: &AgentId) -> Result<bool, DbError> {
        // Existence check keeps the idempotence fast-path honest.
        self.get_rumor(rumor_id).await?;

        let belief = {
            let mut rng = rand::rng();
            rng.random_range(0.5..=0.9)
        };

        let result = sqlx::query(
            r"INSERT INTO rumor_beliefs (rumor_id, agent_id, belief, heard_at)
              VALUES (?, ?, ?, ?)
              ON CONFLICT (rumor_id, agent_id) DO NOTHING",
        )
        .bind(rumor_id.to_string())
        .bind(listener.as_str())
        .bind(belief)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE rumors SET spread_count = spread_count + 1 WHERE id = ?")
            .bind(rumor_id.to_string())
            .execute(self.pool)
            .await?;
        Ok(true)
    }

    /// All rumors about a player, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn rumors_about(&self, player_id: &PlayerId) -> Result<Vec<RumorRow>, DbError> {
        let rows = sqlx::query_as::<_, RumorRow>(
            "SELECT * FROM rumors WHERE about_player = ? ORDER BY created_at DESC",
        )
        .bind(player_id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Rumors an agent has heard about a player, with their belief.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn heard_by(
        &self,
        listener: &AgentId,
        about: &PlayerId,
    ) -> Result<Vec<HeardRumorRow>, DbError> {
        let rows = sqlx::query_as::<_, HeardRumorRow>(
            r"SELECT r.id, r.about_player, r.content, r.truthfulness, b.belief
              FROM rumors r JOIN rumor_beliefs b ON b.rumor_id = r.id
              WHERE b.agent_id = ? AND r.about_player = ?
              ORDER BY r.created_at DESC",
        )
        .bind(listener.as_str())
        .bind(about.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Rumors authored by an agent that a listener has not heard yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn unheard_from(
        &self,
        author: &AgentId,
        listener: &AgentId,
    ) -> Result<Vec<RumorRow>, DbError> {
        let rows = sqlx::query_as::<_, RumorRow>(
            r"SELECT * FROM rumors
              WHERE author_agent = ?
                AND id NOT IN (SELECT rumor_id FROM rumor_beliefs WHERE agent_id = ?)
              ORDER BY created_at DESC",
        )
        .bind(author.as_str())
        .bind(listener.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Whether a listener already knows a rumor.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn knows(&self, listener: &AgentId, rumor_id: RumorId) -> Result<bool, DbError> {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT belief FROM rumor_beliefs WHERE rumor_id = ? AND agent_id = ?",
        )
        .bind(rumor_id.to_string())
        .bind(listener.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::sqlite::Store;

    fn vera() -> AgentId {
        AgentId::from("vera")
    }

    fn p1() -> PlayerId {
        PlayerId::from("p1")
    }

    #[test]
    fn polarity_from_trust_delta() {
        assert_eq!(RumorPolarity::from_trust_delta(0.05), RumorPolarity::Positive);
        assert_eq!(RumorPolarity::from_trust_delta(-0.05), RumorPolarity::Negative);
        assert_eq!(RumorPolarity::from_trust_delta(0.0), RumorPolarity::Neutral);
    }

    #[tokio::test]
    async fn authoring_registers_author_belief() {
        let store = Store::open_in_memory().await.unwrap();
        let rumors = RumorStore::new(store.pool());

        let rumor = rumors
            .author_rumor(&vera(), &p1(), RumorPolarity::Negative)
            .await
            .unwrap();
        assert!(rumor.content.contains("p1"));
        assert!((0.7..=1.0).contains(&rumor.truthfulness));
        assert_eq!(rumor.spread_count, 0);
        assert!(rumors.knows(&vera(), rumor.id).await.unwrap());
    }

    #[tokio::test]
    async fn spreading_is_idempotent_per_listener() {
        let store = Store::open_in_memory().await.unwrap();
        let rumors = RumorStore::new(store.pool());
        let rumor = rumors
            .author_rumor(&vera(), &p1(), RumorPolarity::Negative)
            .await
            .unwrap();

        let garrick = AgentId::from("garrick");
        assert!(rumors.spread(rumor.id, &garrick).await.unwrap());
        assert!(!rumors.spread(rumor.id, &garrick).await.unwrap());
        assert!(!rumors.spread(rumor.id, &garrick).await.unwrap());

        let after = rumors.get_rumor(rumor.id).await.unwrap();
        assert_eq!(after.spread_count, 1);

        let heard = rumors.heard_by(&garrick, &p1()).await.unwrap();
        assert_eq!(heard.len(), 1);
        assert!((0.5..=0.9).contains(&heard[0].belief));
    }

    #[tokio::test]
    async fn unheard_from_excludes_known_rumors() {
        let store = Store::open_in_memory().await.unwrap();
        let rumors = RumorStore::new(store.pool());
        let first = rumors
            .author_rumor(&vera(), &p1(), RumorPolarity::Neutral)
            .await
            .unwrap();
        let second = rumors
            .author_rumor(&vera(), &p1(), RumorPolarity::Positive)
            .await
            .unwrap();

        let garrick = AgentId::from("garrick");
        rumors.spread(first.id, &garrick).await.unwrap();

        let fresh = rumors.unheard_from(&vera(), &garrick).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, second.id);
    }

    #[tokio::test]
    async fn spreading_unknown_rumor_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        let rumors = RumorStore::new(store.pool());
        let result = rumors.spread(RumorId::new(), &vera()).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
