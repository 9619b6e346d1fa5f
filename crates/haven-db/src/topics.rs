//! Topic memory: keyword-classified conversation topics with
//! reinforcement, time-decay and cross-agent sharing.
//!
//! Extraction scans a player message against per-category keyword sets.
//! Every matching category yields (or reinforces) a topic keyed by
//! `(agent, player, category, content)`. Emotional weight starts at the
//! category base plus 0.05 per additional matched keyword, and the decay
//! rate is inversely related to that weight, so emotionally heavy topics
//! fade slower.
//!
//! Strength dynamics:
//!
//! - time-only evolution is non-increasing:
//!   `strength -= decay_rate * (hours/24) * (1.1 - weight)`
//! - any mention resets strength to 1.0 and bumps the reference count
//! - shared memories decay at a fixed 0.08/day and are always weaker than
//!   their source (`weight = 0.8 * source_weight`)
//! - strength below the cleanup threshold (0.1) means permanent removal

use chrono::{DateTime, Utc};
use haven_types::{AgentId, PlayerId, TopicCategory, TopicId};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;

// ---------------------------------------------------------------------------
// Keyword sets
// ---------------------------------------------------------------------------

/// Family and home life.
const FAMILY_KEYWORDS: &[&str] = &[
    "mother", "father", "sister", "brother", "family", "daughter", "son", "wife", "husband",
    "parents", "home",
];

/// Aspirations and plans.
const GOAL_KEYWORDS: &[&str] = &[
    "want", "plan", "dream", "hope", "goal", "wish", "aim", "someday", "intend", "help",
];

/// Fears and worries.
const FEAR_KEYWORDS: &[&str] = &[
    "afraid", "scared", "fear", "terrified", "worry", "worried", "nightmare", "dread", "danger",
];

/// Things that happened.
const EVENT_KEYWORDS: &[&str] = &[
    "happened", "attack", "attacked", "found", "saw", "witnessed", "yesterday", "discovered",
    "raid",
];

/// Likes and dislikes.
const PREFERENCE_KEYWORDS: &[&str] = &[
    "like", "love", "hate", "prefer", "favorite", "enjoy", "despise",
];

/// Confided information.
const SECRET_KEYWORDS: &[&str] = &[
    "secret", "confess", "don't tell", "between us", "promise", "hide", "hidden",
];

/// Where the speaker comes from.
const ORIGIN_KEYWORDS: &[&str] = &[
    "born", "came from", "grew up", "raised", "homeland", "village", "hometown",
];

/// Work and craft.
const PROFESSION_KEYWORDS: &[&str] = &[
    "work", "job", "trade", "craft", "merchant", "guard", "hunter", "farmer", "smith", "doctor",
];

/// Wrongdoing.
const CRIME_KEYWORDS: &[&str] = &[
    "stole", "steal", "killed", "murder", "crime", "robbed", "smuggle", "bounty", "outlaw",
    "theft",
];

/// Keyword set for a category.
const fn keywords_for(category: TopicCategory) -> &'static [&'static str] {
    match category {
        TopicCategory::Family => FAMILY_KEYWORDS,
        TopicCategory::Goal => GOAL_KEYWORDS,
        TopicCategory::Fear => FEAR_KEYWORDS,
        TopicCategory::Event => EVENT_KEYWORDS,
        TopicCategory::Preference => PREFERENCE_KEYWORDS,
        TopicCategory::Secret => SECRET_KEYWORDS,
        TopicCategory::Origin => ORIGIN_KEYWORDS,
        TopicCategory::Profession => PROFESSION_KEYWORDS,
        TopicCategory::Crime => CRIME_KEYWORDS,
    }
}

// ---------------------------------------------------------------------------
// Extraction (pure)
// ---------------------------------------------------------------------------

/// Weight bonus per matched keyword beyond the first.
const EXTRA_KEYWORD_BONUS: f64 = 0.05;

/// Floor of the derived decay rate.
const DECAY_RATE_FLOOR: f64 = 0.02;

/// Fixed decay rate of shared memories, per day.
const SHARED_DECAY_PER_DAY: f64 = 0.08;

/// Weight scaling applied when a topic is retold to another agent.
const SHARE_WEIGHT_FACTOR: f64 = 0.8;

/// Trust factor attached to every fresh share.
const SHARE_TRUST_FACTOR: f64 = 0.7;

/// Default strength floor below which topics are cleaned up.
pub const CLEANUP_THRESHOLD: f64 = 0.1;

/// Strength floor below which a topic is not worth recalling.
const RECALL_FLOOR: f64 = 0.2;

/// A category match produced by scanning one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTopic {
    /// Matched category.
    pub category: TopicCategory,
    /// Keywords of the category found in the message.
    pub keywords: Vec<String>,
    /// Derived emotional weight.
    pub emotional_weight: f64,
    /// Derived decay rate.
    pub decay_rate: f64,
}

/// Scan a message for topic categories.
///
/// A category matches when at least one of its keywords occurs in the
/// lowercased message. Weight is the category base plus 0.05 for every
/// matched keyword beyond the first, capped at 1.0; the decay rate is
/// `max(0.02, 0.08 - 0.05 * weight)`.
pub fn extract_topics(message: &str) -> Vec<ExtractedTopic> {
    let lower = message.to_lowercase();
    let mut extracted = Vec::new();

    for category in TopicCategory::ALL {
        let matched: Vec<String> = keywords_for(category)
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| (*kw).to_owned())
            .collect();

        if matched.is_empty() {
            continue;
        }

        let extra = (matched.len() - 1) as f64;
        let weight = (category.base_weight() + extra * EXTRA_KEYWORD_BONUS).min(1.0);
        extracted.push(ExtractedTopic {
            category,
            keywords: matched,
            emotional_weight: weight,
            decay_rate: decay_rate_for(weight),
        });
    }

    extracted
}

/// Decay rate derived from emotional weight.
fn decay_rate_for(weight: f64) -> f64 {
    (0.08 - 0.05 * weight).max(DECAY_RATE_FLOOR)
}

/// Clarity bucket a topic falls into, derived from its strength.
pub fn clarity(strength: f64) -> &'static str {
    if strength > 0.8 {
        "vivid"
    } else if strength > 0.5 {
        "clear"
    } else if strength > 0.2 {
        "vague"
    } else {
        "faded"
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `topics` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct TopicRow {
    /// Topic identifier.
    #[sqlx(try_from = "String")]
    pub id: TopicId,
    /// The player the topic was learned from.
    #[sqlx(try_from = "String")]
    pub player_id: PlayerId,
    /// The agent who remembers it.
    #[sqlx(try_from = "String")]
    pub agent_id: AgentId,
    /// Keyword category.
    #[sqlx(try_from = "String")]
    pub category: TopicCategory,
    /// The remembered content (the triggering message).
    pub content: String,
    /// Emotional weight in `[0,1]`.
    pub emotional_weight: f64,
    /// Keywords that matched at extraction time.
    #[sqlx(json)]
    pub keywords: Vec<String>,
    /// How often the topic has been mentioned.
    pub reference_count: i64,
    /// Memory strength in `[0,1]`.
    pub strength: f64,
    /// Per-day decay coefficient.
    pub decay_rate: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last reinforcement time.
    pub last_reinforced: DateTime<Utc>,
}

impl TopicRow {
    /// Clarity bucket of this topic.
    pub fn clarity(&self) -> &'static str {
        clarity(self.strength)
    }
}

/// A row from the `shared_memories` table: a topic retold agent-to-agent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct SharedMemoryRow {
    /// Share identifier.
    pub id: String,
    /// The source topic.
    #[sqlx(try_from = "String")]
    pub topic_id: TopicId,
    /// Who retold it.
    #[sqlx(try_from = "String")]
    pub from_agent: AgentId,
    /// Who heard it.
    #[sqlx(try_from = "String")]
    pub to_agent: AgentId,
    /// The player the topic is about.
    #[sqlx(try_from = "String")]
    pub player_id: PlayerId,
    /// Category inherited from the source.
    #[sqlx(try_from = "String")]
    pub category: TopicCategory,
    /// Content inherited from the source.
    pub content: String,
    /// Scaled emotional weight (`0.8 *` source weight at creation).
    pub emotional_weight: f64,
    /// Credibility scaling in `[0,1]`.
    pub trust_factor: f64,
    /// Independent strength; decays at the fixed shared rate.
    pub strength: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A topic scored against a current message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTopic {
    /// The stored topic.
    pub topic: TopicRow,
    /// Relevance score used for ranking.
    pub score: f64,
}

/// Result of one decay pass over both topic tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DecayReport {
    /// Topics whose strength was reduced.
    pub topics_decayed: u64,
    /// Shared memories whose strength was reduced.
    pub shared_decayed: u64,
}

/// Result of one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Topics permanently removed.
    pub topics_removed: u64,
    /// Shared memories permanently removed.
    pub shared_removed: u64,
}

// ---------------------------------------------------------------------------
// TopicStore
// ---------------------------------------------------------------------------

/// Typed operations on the `topics` and `shared_memories` tables.
pub struct TopicStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TopicStore<'a> {
    /// Create a topic store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Extract topics from a message and persist them for `(agent, player)`.
    ///
    /// Collisions on `(agent, player, category, content)` reinforce the
    /// existing topic (strength back to 1.0, reference count bumped)
    /// instead of duplicating. Returns how many topics were newly created
    /// and how many were reinforced.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn record_message(
        &self,
        agent_id: &AgentId,
        player_id: &PlayerId,
        message: &str,
    ) -> Result<(usize, usize), DbError> {
        let mut created = 0;
        let mut reinforced = 0;
        let now = Utc::now();

        for topic in extract_topics(message) {
            let keywords_json = serde_json::to_string(&topic.keywords)?;
            let result = sqlx::query(
                r"INSERT INTO topics
                    (id, player_id, agent_id, category, content, emotional_weight,
                     keywords, reference_count, strength, decay_rate, created_at, last_reinforced)
                  VALUES (?, ?, ?, ?, ?, ?, ?, 1, 1.0, ?, ?, ?)
                  ON CONFLICT (agent_id, player_id, category, content) DO NOTHING",
            )
            .bind(TopicId::new().to_string())
            .bind(player_id.as_str())
            .bind(agent_id.as_str())
            .bind(topic.category.as_str())
            .bind(message)
            .bind(topic.emotional_weight)
            .bind(&keywords_json)
            .bind(topic.decay_rate)
            .bind(now)
            .bind(now)
            .execute(self.pool)
            .await?;

            if result.rows_affected() == 1 {
                created += 1;
            } else {
                sqlx::query(
                    r"UPDATE topics
                      SET strength = 1.0,
                          reference_count = reference_count + 1,
                          last_reinforced = ?
                      WHERE agent_id = ? AND player_id = ? AND category = ? AND content = ?",
                )
                .bind(now)
                .bind(agent_id.as_str())
                .bind(player_id.as_str())
                .bind(topic.category.as_str())
                .bind(message)
                .execute(self.pool)
                .await?;
                reinforced += 1;
            }
        }

        Ok((created, reinforced))
    }

    /// All direct topics an agent holds about a player, strongest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn topics_for(
        &self,
        agent_id: &AgentId,
        player_id: &PlayerId,
    ) -> Result<Vec<TopicRow>, DbError> {
        let rows = sqlx::query_as::<_, TopicRow>(
            r"SELECT * FROM topics WHERE agent_id = ? AND player_id = ?
              ORDER BY strength DESC, emotional_weight DESC",
        )
        .bind(agent_id.as_str())
        .bind(player_id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Score stored topics against the current message and return the
    /// top `limit`, dropping those below the recall floor (0.2).
    ///
    /// The score combines keyword overlap, emotional weight (with an
    /// extra term for high-weight topics) and memory strength.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn relevant_topics(
        &self,
        agent_id: &AgentId,
        player_id: &PlayerId,
        message: &str,
        limit: usize,
    ) -> Result<Vec<ScoredTopic>, DbError> {
        let lower = message.to_lowercase();
        let all = self.topics_for(agent_id, player_id).await?;

        let mut scored: Vec<ScoredTopic> = all
            .into_iter()
            .filter(|t| t.strength >= RECALL_FLOOR)
            .map(|topic| {
                let overlap = keyword_overlap(&lower, &topic.keywords);
                let weight = topic.emotional_weight;
                let high_weight_bonus = if weight >= 0.8 { weight * 0.3 } else { 0.0 };
                let score = overlap * 0.3 + high_weight_bonus + topic.strength * 0.5 + weight * 0.3;
                ScoredTopic { topic, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Reinforce a topic: mentioned in dialogue, so strength resets to
    /// 1.0, the reference count bumps and the reinforcement time updates.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown topic id.
    pub async fn reinforce(&self, topic_id: TopicId) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE topics
              SET strength = 1.0, reference_count = reference_count + 1, last_reinforced = ?
              WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(topic_id.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("topic {topic_id}")));
        }
        Ok(())
    }

    /// Mass-reinforce every topic of `(agent, player)` whose keywords
    /// overlap the new message. Returns how many were reinforced.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn reinforce_by_keywords(
        &self,
        agent_id: &AgentId,
        player_id: &PlayerId,
        message: &str,
    ) -> Result<usize, DbError> {
        let lower = message.to_lowercase();
        let all = self.topics_for(agent_id, player_id).await?;
        let mut count = 0;

        for topic in all {
            if keyword_overlap(&lower, &topic.keywords) > 0.0 {
                self.reinforce(topic.id).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Apply time decay to every topic and shared memory.
    ///
    /// `hours` is the simulated time since the previous decay pass.
    /// Direct topics lose `decay_rate * (hours/24) * (1.1 - weight)`;
    /// shared memories lose the fixed 0.08/day. Strength never drops
    /// below zero, so sequential passes compose additively.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a write fails.
    pub async fn decay(&self, hours: f64) -> Result<DecayReport, DbError> {
        let days = hours / 24.0;

        let topics = sqlx::query(
            r"UPDATE topics
              SET strength = MAX(0.0, strength - decay_rate * ? * (1.1 - emotional_weight))
              WHERE strength > 0.0",
        )
        .bind(days)
        .execute(self.pool)
        .await?;

        let shared = sqlx::query(
            r"UPDATE shared_memories
              SET strength = MAX(0.0, strength - ? * ?)
              WHERE strength > 0.0",
        )
        .bind(SHARED_DECAY_PER_DAY)
        .bind(days)
        .execute(self.pool)
        .await?;

        Ok(DecayReport {
            topics_decayed: topics.rows_affected(),
            shared_decayed: shared.rows_affected(),
        })
    }

    /// Permanently remove topics and shared memories below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if a delete fails.
    pub async fn cleanup(&self, threshold: f64) -> Result<CleanupReport, DbError> {
        let topics = sqlx::query("DELETE FROM topics WHERE strength < ?")
            .bind(threshold)
            .execute(self.pool)
            .await?;
        let shared = sqlx::query("DELETE FROM shared_memories WHERE strength < ?")
            .bind(threshold)
            .execute(self.pool)
            .await?;

        let report = CleanupReport {
            topics_removed: topics.rows_affected(),
            shared_removed: shared.rows_affected(),
        };
        if report.topics_removed > 0 || report.shared_removed > 0 {
            tracing::debug!(
                topics = report.topics_removed,
                shared = report.shared_removed,
                "forgotten memories cleaned up"
            );
        }
        Ok(report)
    }

    /// The top-weighted topics an agent could retell, strongest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn top_topics_of(
        &self,
        agent_id: &AgentId,
        limit: usize,
    ) -> Result<Vec<TopicRow>, DbError> {
        let rows = sqlx::query_as::<_, TopicRow>(
            r"SELECT * FROM topics WHERE agent_id = ?
              ORDER BY emotional_weight DESC, strength DESC LIMIT ?",
        )
        .bind(agent_id.as_str())
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Retell a topic from its owner to another agent.
    ///
    /// The share carries `weight = 0.8 * source_weight`, a trust factor
    /// of 0.7, and starts at the source topic's current strength.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] if the topic does not exist.
    /// - [`DbError::Conflict`] if the source is not owned by `from`, the
    ///   listener is the owner, or the topic was already shared with the
    ///   listener.
    pub async fn share_topic(
        &self,
        topic_id: TopicId,
        from_agent: &AgentId,
        to_agent: &AgentId,
    ) -> Result<SharedMemoryRow, DbError> {
        let source = sqlx::query_as::<_, TopicRow>("SELECT * FROM topics WHERE id = ?")
            .bind(topic_id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("topic {topic_id}")))?;

        if &source.agent_id != from_agent {
            return Err(DbError::Conflict(format!(
                "topic {topic_id} is not owned by {from_agent}"
            )));
        }
        if from_agent == to_agent {
            return Err(DbError::Conflict("cannot share a memory with oneself".to_owned()));
        }

        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            r"INSERT INTO shared_memories
                (id, topic_id, from_agent, to_agent, player_id, category, content,
                 emotional_weight, trust_factor, strength, created_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT (topic_id, to_agent) DO NOTHING",
        )
        .bind(&id)
        .bind(topic_id.to_string())
        .bind(from_agent.as_str())
        .bind(to_agent.as_str())
        .bind(source.player_id.as_str())
        .bind(source.category.as_str())
        .bind(&source.content)
        .bind(source.emotional_weight * SHARE_WEIGHT_FACTOR)
        .bind(SHARE_TRUST_FACTOR)
        .bind(source.strength)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "topic {topic_id} already shared with {to_agent}"
            )));
        }

        let row = sqlx::query_as::<_, SharedMemoryRow>("SELECT * FROM shared_memories WHERE id = ?")
            .bind(&id)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Shared memories an agent has heard about a player.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn shared_about(
        &self,
        to_agent: &AgentId,
        player_id: &PlayerId,
    ) -> Result<Vec<SharedMemoryRow>, DbError> {
        let rows = sqlx::query_as::<_, SharedMemoryRow>(
            r"SELECT * FROM shared_memories WHERE to_agent = ? AND player_id = ?
              ORDER BY strength DESC",
        )
        .bind(to_agent.as_str())
        .bind(player_id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Fraction of the topic's keywords present in the lowercased message.
fn keyword_overlap(lower_message: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let hits = keywords
        .iter()
        .filter(|kw| lower_message.contains(kw.as_str()))
        .count();
    hits as f64 / keywords.len() as f64
}
