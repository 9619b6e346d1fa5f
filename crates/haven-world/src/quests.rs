//! Quest, chain and goal generation.
//!
//! Generators pick from template tables and persist through the quest
//! store; transitions themselves (accept, complete, advance) live in
//! `haven-db::quests`. Every generated record is announced on the quest
//! channel.

use chrono::{Duration as ChronoDuration, Utc};
use haven_db::{ChainRow, GoalRow, QuestRow, QuestStore};
use haven_events::{EventChannel, WorldEvent};
use haven_types::{AgentId, PlayerId};
use rand::Rng;

use crate::error::WorldError;
use crate::registry::Fleet;

/// Quest templates: title, description, gold, reputation, deadline hours.
const QUEST_TEMPLATES: &[(&str, &str, i64, f64, i64)] = &[
    (
        "Clear the ridge",
        "Scavengers have dug in on the northern ridge. Drive them off.",
        60,
        0.1,
        48,
    ),
    (
        "Supply run",
        "The infirmary is short on clean bandages. Bring back what you can find.",
        30,
        0.05,
        24,
    ),
    (
        "Missing patrol",
        "A two-man patrol never reported back from the east road. Find out why.",
        80,
        0.15,
        72,
    ),
    (
        "Rat in the walls",
        "Someone has been pilfering the grain stores at night. Catch them.",
        45,
        0.1,
        48,
    ),
    (
        "Escort the caravan",
        "A trade caravan needs a blade alongside it as far as the crossroads.",
        70,
        0.1,
        36,
    ),
];

/// Chain templates: name plus ordered steps.
const CHAIN_TEMPLATES: &[(&str, &[&str])] = &[
    (
        "Gate watch",
        &[
            "report to the watch captain",
            "stand first watch at the gates",
            "file the night's incident log",
        ],
    ),
    (
        "Trade papers",
        &[
            "collect the manifest from the market row",
            "verify the caravan's cargo",
            "stamp and return the papers",
        ],
    ),
];

/// Goal templates: kind, description, steps, gold.
const GOAL_TEMPLATES: &[(&str, &str, &[&str], i64)] = &[
    (
        "patrol",
        "Walk the settlement perimeter nightly.",
        &["north wall", "east road", "south gate"],
        20,
    ),
    (
        "stockpile",
        "Lay in supplies before the cold season.",
        &["salvage tools", "dry rations", "seal the cache"],
        35,
    ),
    (
        "recruit",
        "Find one more able pair of hands for the faction.",
        &["ask around the market", "vouch for the recruit"],
        25,
    ),
];

/// Generate a quest offered by an agent, optionally pre-bound intent
/// toward a player (the player still has to accept).
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if the giver is unregistered.
pub async fn generate_quest(
    fleet: &Fleet,
    giver: &AgentId,
    _player: Option<&PlayerId>,
) -> Result<QuestRow, WorldError> {
    fleet.handle(giver).await?;

    let (title, description, gold, reputation, deadline_hours) = {
        let mut rng = rand::rng();
        QUEST_TEMPLATES[rng.random_range(0..QUEST_TEMPLATES.len())]
    };

    let store = QuestStore::new(&fleet.deps().pool);
    let quest = store
        .create_quest(
            giver,
            title,
            description,
            gold,
            reputation,
            None,
            Utc::now() + ChronoDuration::hours(deadline_hours),
        )
        .await?;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::QuestUpdates,
        "quest_generated",
        serde_json::json!({
            "quest_id": quest.id,
            "giver": giver,
            "title": quest.title,
        }),
    ));
    Ok(quest)
}

/// Create a quest chain for an agent from the template table.
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if the agent is unregistered.
pub async fn generate_chain(fleet: &Fleet, agent: &AgentId) -> Result<ChainRow, WorldError> {
    fleet.handle(agent).await?;

    let (name, steps) = {
        let mut rng = rand::rng();
        CHAIN_TEMPLATES[rng.random_range(0..CHAIN_TEMPLATES.len())]
    };
    let steps: Vec<String> = steps.iter().map(|s| (*s).to_owned()).collect();

    let chain = QuestStore::new(&fleet.deps().pool)
        .create_chain(agent, name, &steps)
        .await?;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::QuestUpdates,
        "chain_created",
        serde_json::json!({"chain_id": chain.id, "agent": agent, "name": chain.name}),
    ));
    Ok(chain)
}

/// Generate an active goal for an agent.
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if the agent is unregistered.
pub async fn generate_goal(
    fleet: &Fleet,
    agent: &AgentId,
    faction: Option<&str>,
) -> Result<GoalRow, WorldError> {
    fleet.handle(agent).await?;

    let (kind, description, steps, gold) = {
        let mut rng = rand::rng();
        GOAL_TEMPLATES[rng.random_range(0..GOAL_TEMPLATES.len())]
    };
    let steps: Vec<String> = steps.iter().map(|s| (*s).to_owned()).collect();

    let goal = QuestStore::new(&fleet.deps().pool)
        .create_goal(agent, faction, kind, description, &steps, gold)
        .await?;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::QuestUpdates,
        "goal_generated",
        serde_json::json!({"goal_id": goal.id, "agent": agent, "kind": goal.kind}),
    ));
    Ok(goal)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testutil::{fleet_with_script, FRIENDLY_FRAME};
    use haven_types::{GoalStatus, QuestStatus};

    #[tokio::test]
    async fn generated_quest_is_available_with_deadline() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, Some("guards")).await.unwrap();

        let quest = generate_quest(&fleet, &vera, None).await.unwrap();
        assert_eq!(quest.status, QuestStatus::Available);
        assert!(quest.deadline > Utc::now());
        assert!(quest.reward_gold > 0);
    }

    #[tokio::test]
    async fn quest_for_unknown_giver_is_not_found() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let result = generate_quest(&fleet, &AgentId::from("ghost"), None).await;
        assert!(matches!(result, Err(WorldError::NotFound(_))));
    }

    #[tokio::test]
    async fn generated_chain_has_ordered_steps() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, Some("guards")).await.unwrap();

        let chain = generate_chain(&fleet, &vera).await.unwrap();
        assert!(chain.steps.len() >= 2);
        assert_eq!(chain.cursor, 0);
    }

    #[tokio::test]
    async fn generated_goal_starts_active_with_steps() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, Some("guards")).await.unwrap();

        let goal = generate_goal(&fleet, &vera, Some("guards")).await.unwrap();
        assert_eq!(goal.status, GoalStatus::Active);
        assert!(goal.progress.abs() < f64::EPSILON);
        assert!(!goal.steps.is_empty());
        assert_eq!(goal.faction.as_deref(), Some("guards"));
    }

    #[tokio::test]
    async fn generation_emits_quest_events() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        fleet.register(&vera, Some("guards")).await.unwrap();
        generate_quest(&fleet, &vera, None).await.unwrap();

        let events = fleet.deps().events.recent(10);
        assert!(events.iter().any(|e| e.kind == "quest_generated"));
    }
}
