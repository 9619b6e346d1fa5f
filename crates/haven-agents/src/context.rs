//! Reactive-cycle context assembly.
//!
//! Before a model call, the cycle gathers the agent's recent memories,
//! strongest beliefs, relevant direct topics, shared memories about the
//! player, and rumors the agent has heard -- then folds everything into
//! the user-prompt context value.

use haven_db::{
    BeliefRow, DbError, HeardRumorRow, MemoryRow, MemoryVault, PlayerStore, RumorStore,
    ScoredTopic, SharedMemoryRow, TopicStore,
};
use haven_types::{AgentId, LimbicSnapshot, PlayerId};
use sqlx::SqlitePool;

use crate::config::AgentConfig;

/// Everything a reactive cycle knows going into the model call.
#[derive(Debug)]
pub struct ReactiveContext {
    /// Recent memories (newest first).
    pub memories: Vec<MemoryRow>,
    /// Strongest beliefs.
    pub beliefs: Vec<BeliefRow>,
    /// Topics relevant to the current message.
    pub topics: Vec<ScoredTopic>,
    /// Shared memories about this player.
    pub shared: Vec<SharedMemoryRow>,
    /// Rumors the agent has heard about this player.
    pub rumors: Vec<HeardRumorRow>,
}

impl ReactiveContext {
    /// Load the full context for `(agent, player, message)`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any store read fails.
    pub async fn load(
        pool: &SqlitePool,
        config: &AgentConfig,
        agent_id: &AgentId,
        player_id: &PlayerId,
        message: &str,
    ) -> Result<Self, DbError> {
        let vault = MemoryVault::new(pool);
        let topics = TopicStore::new(pool);
        let rumors = RumorStore::new(pool);

        Ok(Self {
            memories: vault.recent_memories(agent_id, config.memory_context).await?,
            beliefs: vault.top_beliefs(agent_id, config.belief_context).await?,
            topics: topics
                .relevant_topics(agent_id, player_id, message, config.topic_context)
                .await?,
            shared: topics.shared_about(agent_id, player_id).await?,
            rumors: rumors.heard_by(agent_id, player_id).await?,
        })
    }

    /// Number of secondhand items (shared memories + rumors) in context.
    pub fn heard_from_others(&self) -> usize {
        self.shared.len() + self.rumors.len()
    }

    /// Fold the context into the value the user-prompt template expects.
    pub fn to_prompt_value(&self, perception: &str, limbic: &LimbicSnapshot) -> serde_json::Value {
        let memories: Vec<serde_json::Value> = self
            .memories
            .iter()
            .map(|m| {
                serde_json::json!({
                    "kind": m.kind.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let beliefs: Vec<&str> = self.beliefs.iter().map(|b| b.belief.as_str()).collect();

        let topics: Vec<serde_json::Value> = self
            .topics
            .iter()
            .map(|t| {
                serde_json::json!({
                    "clarity": t.topic.clarity(),
                    "category": t.topic.category.as_str(),
                    "content": t.topic.content,
                })
            })
            .collect();

        let mut heard: Vec<String> = self
            .shared
            .iter()
            .map(|s| format!("{} told you: {}", s.from_agent, s.content))
            .collect();
        heard.extend(
            self.rumors
                .iter()
                .map(|r| format!("rumor has it: {}", r.content)),
        );

        serde_json::json!({
            "perception": perception,
            "vitals": limbic.vitals,
            "mood": limbic.emotional_state.mood,
            "arousal": limbic.emotional_state.arousal,
            "memories": memories,
            "beliefs": beliefs,
            "topics": topics,
            "heard": heard,
        })
    }
}

/// Ensure the player session exists before a cycle touches reputation.
///
/// # Errors
///
/// Returns [`DbError`] if the write fails.
pub async fn ensure_player_session(
    pool: &SqlitePool,
    player_id: &PlayerId,
    player_name: Option<&str>,
) -> Result<(), DbError> {
    PlayerStore::new(pool)
        .ensure_player(player_id, player_name)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use haven_db::Store;
    use haven_types::MemoryKind;

    #[tokio::test]
    async fn load_gathers_all_context_sources() {
        let store = Store::open_in_memory().await.unwrap();
        let pool = store.pool();
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        let player = PlayerId::from("p1");
        let config = AgentConfig::default();

        let vault = MemoryVault::new(pool);
        for i in 0..5 {
            vault
                .store_memory(&vera, MemoryKind::Episodic, &format!("event {i}"), 0.6)
                .await
                .unwrap();
        }
        vault.save_belief(&vera, "the roads are unsafe", 0.7).await.unwrap();

        let topics = TopicStore::new(pool);
        topics
            .record_message(&vera, &player, "I want to help the settlement")
            .await
            .unwrap();

        // Garrick knows something about the player and told Vera.
        topics
            .record_message(&garrick, &player, "Keep this secret between us")
            .await
            .unwrap();
        let source = topics.topics_for(&garrick, &player).await.unwrap()[0].clone();
        topics.share_topic(source.id, &garrick, &vera).await.unwrap();

        let rumors = RumorStore::new(pool);
        let rumor = rumors
            .author_rumor(&garrick, &player, haven_db::RumorPolarity::Negative)
            .await
            .unwrap();
        rumors.spread(rumor.id, &vera).await.unwrap();

        let context = ReactiveContext::load(pool, &config, &vera, &player, "can you help me?")
            .await
            .unwrap();

        assert_eq!(context.memories.len(), 3); // capped at config.memory_context
        assert_eq!(context.beliefs.len(), 1);
        assert_eq!(context.topics.len(), 1);
        assert_eq!(context.shared.len(), 1);
        assert_eq!(context.rumors.len(), 1);
        assert_eq!(context.heard_from_others(), 2);
    }

    #[tokio::test]
    async fn prompt_value_has_template_fields() {
        let store = Store::open_in_memory().await.unwrap();
        let config = AgentConfig::default();
        let vera = AgentId::from("vera");
        let player = PlayerId::from("p1");

        let context = ReactiveContext::load(store.pool(), &config, &vera, &player, "hello")
            .await
            .unwrap();
        let limbic = crate::limbic::LimbicSystem::new().snapshot();
        let value = context.to_prompt_value("a stranger waves", &limbic);

        assert_eq!(value["perception"], "a stranger waves");
        assert!(value["vitals"]["hunger"].is_number());
        assert!(value["memories"].as_array().unwrap().is_empty());
        assert!(value["heard"].as_array().unwrap().is_empty());
    }
}
