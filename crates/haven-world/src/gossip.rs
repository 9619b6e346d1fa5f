//! Gossip: the single place that composes relation, memory sharing and
//! rumor spread into one coherent step.
//!
//! Topic memory exposes pure queries; the rumor store exposes
//! idempotent spread. This module is the only composer of the two, so
//! the "relation gates sharing" rule lives exactly once:
//!
//! - rumors the sharer authored and the listener has not heard are
//!   spread (the listener samples a belief, the counter bumps once)
//! - when the relation is at least 0.5, each of the sharer's
//!   top-weighted topics is proposed with probability equal to the
//!   relation score; accepted shares carry scaled weight and fixed trust
//! - any exchange counts as a shared experience and nudges the relation
//!   upward

use haven_db::{DbError, RelationStore, RumorStore, TopicStore};
use haven_events::{EventChannel, WorldEvent};
use haven_types::{AgentId, PlayerId};
use rand::Rng;

use crate::error::WorldError;
use crate::registry::Fleet;

/// Relation score required before topics are shared.
const SHARE_RELATION_FLOOR: f64 = 0.5;

/// Topics proposed per gossip exchange.
const TOPICS_PER_EXCHANGE: usize = 5;

/// Rumors passed on per gossip exchange.
const RUMORS_PER_EXCHANGE: usize = 3;

/// Relation bump after a successful exchange.
const EXCHANGE_RELATION_BONUS: f64 = 0.05;

/// What one gossip step exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GossipReport {
    /// Rumors newly spread to the listener.
    pub rumors_shared: usize,
    /// Topics newly shared with the listener.
    pub memories_shared: usize,
    /// Whether the relation improved as a result.
    pub relationship_improved: bool,
}

/// Run one gossip step from `from` to `to`.
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if either agent is unregistered,
/// [`WorldError::Conflict`] if an agent gossips with itself.
pub async fn gossip(fleet: &Fleet, from: &AgentId, to: &AgentId) -> Result<GossipReport, WorldError> {
    if from == to {
        return Err(WorldError::Conflict("an agent cannot gossip with itself".to_owned()));
    }
    fleet.handle(from).await?;
    fleet.handle(to).await?;

    let pool = &fleet.deps().pool;
    let relation = RelationStore::new(pool).score(from, to).await?;

    let rumors_shared = spread_rumors(pool, from, to).await?;
    let memories_shared = share_topics(pool, relation, from, to, None).await?;

    let relationship_improved = rumors_shared > 0 || memories_shared > 0;
    if relationship_improved {
        RelationStore::new(pool)
            .adjust(from, to, EXCHANGE_RELATION_BONUS, true)
            .await?;
    }

    let report = GossipReport {
        rumors_shared,
        memories_shared,
        relationship_improved,
    };
    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::WorldEvents,
        "gossip",
        serde_json::json!({
            "from": from,
            "to": to,
            "rumors_shared": rumors_shared,
            "memories_shared": memories_shared,
        }),
    ));
    Ok(report)
}

/// Share topics about one specific player (the reactive cycle's
/// opportunistic-share step, invoked by the action surface).
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if either agent is unregistered.
pub async fn share_memories(
    fleet: &Fleet,
    from: &AgentId,
    to: &AgentId,
    player: Option<&PlayerId>,
) -> Result<usize, WorldError> {
    if from == to {
        return Err(WorldError::Conflict("an agent cannot share memories with itself".to_owned()));
    }
    fleet.handle(from).await?;
    fleet.handle(to).await?;

    let pool = &fleet.deps().pool;
    let relation = RelationStore::new(pool).score(from, to).await?;
    let shared = share_topics(pool, relation, from, to, player).await?;
    if shared > 0 {
        RelationStore::new(pool)
            .adjust(from, to, EXCHANGE_RELATION_BONUS, true)
            .await?;
    }
    Ok(shared)
}

/// Spread the sharer's unheard rumors to the listener.
async fn spread_rumors(
    pool: &sqlx::SqlitePool,
    from: &AgentId,
    to: &AgentId,
) -> Result<usize, DbError> {
    let rumors = RumorStore::new(pool);
    let unheard = rumors.unheard_from(from, to).await?;
    let mut spread = 0;
    for rumor in unheard.into_iter().take(RUMORS_PER_EXCHANGE) {
        if rumors.spread(rumor.id, to).await? {
            spread += 1;
        }
    }
    Ok(spread)
}

/// Propose the sharer's top topics to the listener, gated by relation.
async fn share_topics(
    pool: &sqlx::SqlitePool,
    relation: f64,
    from: &AgentId,
    to: &AgentId,
    player: Option<&PlayerId>,
) -> Result<usize, DbError> {
    if relation < SHARE_RELATION_FLOOR {
        return Ok(0);
    }

    let topics = TopicStore::new(pool);
    let candidates = match player {
        Some(player) => topics.topics_for(from, player).await?,
        None => topics.top_topics_of(from, TOPICS_PER_EXCHANGE).await?,
    };

    let mut shared = 0;
    for topic in candidates.into_iter().take(TOPICS_PER_EXCHANGE) {
        // Probability of retelling is proportional to the relation.
        let roll: f64 = rand::rng().random();
        if roll >= relation {
            continue;
        }
        match topics.share_topic(topic.id, from, to).await {
            Ok(_) => shared += 1,
            // Already told them this one; move on.
            Err(DbError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(shared)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testutil::{fleet_with_script, FRIENDLY_FRAME};
    use haven_db::RumorPolarity;

    #[tokio::test]
    async fn gossip_spreads_rumors_once() {
        let (fleet, store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();

        let rumors = RumorStore::new(store.pool());
        let rumor = rumors
            .author_rumor(&vera, &PlayerId::from("p1"), RumorPolarity::Negative)
            .await
            .unwrap();

        let report = gossip(&fleet, &vera, &garrick).await.unwrap();
        assert_eq!(report.rumors_shared, 1);
        assert!(report.relationship_improved);

        // The listener knows it with a sampled belief; the counter is 1.
        assert!(rumors.knows(&garrick, rumor.id).await.unwrap());
        let after = rumors.get_rumor(rumor.id).await.unwrap();
        assert_eq!(after.spread_count, 1);

        // Gossiping again is a no-op for this rumor.
        let second = gossip(&fleet, &vera, &garrick).await.unwrap();
        assert_eq!(second.rumors_shared, 0);
        let after = rumors.get_rumor(rumor.id).await.unwrap();
        assert_eq!(after.spread_count, 1);
    }

    #[tokio::test]
    async fn low_relation_blocks_topic_sharing() {
        let (fleet, store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let mara = AgentId::from("mara");
        // Cross-faction: relation seeds at 0.3, below the share floor.
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&mara, Some("outcasts")).await.unwrap();

        let topics = TopicStore::new(store.pool());
        topics
            .record_message(&vera, &PlayerId::from("p1"), "Keep this secret between us.")
            .await
            .unwrap();

        let shared = share_memories(&fleet, &vera, &mara, None).await.unwrap();
        assert_eq!(shared, 0);
    }

    #[tokio::test]
    async fn gossip_with_self_is_a_conflict() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, None).await.unwrap();
        assert!(matches!(
            gossip(&fleet, &vera, &vera).await,
            Err(WorldError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn shared_topics_respect_scaling_invariant() {
        let (fleet, store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let garrick = AgentId::from("garrick");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&garrick, Some("guards")).await.unwrap();
        // Push the relation to certainty so every proposal is accepted.
        RelationStore::new(store.pool())
            .adjust(&vera, &garrick, 1.0, false)
            .await
            .unwrap();

        let topics = TopicStore::new(store.pool());
        let player = PlayerId::from("p1");
        topics
            .record_message(&vera, &player, "Keep this secret between us.")
            .await
            .unwrap();
        let source = topics.topics_for(&vera, &player).await.unwrap()[0].clone();

        let shared = share_memories(&fleet, &vera, &garrick, Some(&player))
            .await
            .unwrap();
        assert_eq!(shared, 1);

        let heard = topics.shared_about(&garrick, &player).await.unwrap();
        assert_eq!(heard.len(), 1);
        assert!(heard[0].emotional_weight <= source.emotional_weight * 0.8 + 1e-12);
        assert!((heard[0].trust_factor - 0.7).abs() < f64::EPSILON);
    }
}
