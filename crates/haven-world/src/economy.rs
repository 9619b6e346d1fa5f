//! World-layer trade and territory orchestration.
//!
//! Thin composition over `haven-db::economy`: random route parameters,
//! faction-strength derivation for battles, faction-relation feedback,
//! and event emission. The state machines themselves live in the store.

use haven_db::{BattleRow, EconomyStore, RouteRow, TerritoryRow, TradeOutcome};
use haven_events::{EventChannel, WorldEvent};
use haven_types::{AgentId, BattleId, RouteId, TerritoryId};
use rand::Rng;

use crate::error::WorldError;
use crate::registry::Fleet;

/// Goods a new route may carry.
const GOODS: &[&str] = &["salvage", "grain", "medicine", "ammunition", "cloth", "tools"];

/// Relation bonus between factions on a successful trade.
const TRADE_RELATION_BONUS: f64 = 0.05;

/// Relation penalty toward the battle loser's faction pair.
const BATTLE_RELATION_PENALTY: f64 = -0.15;

/// Base faction strength before the per-member bonus.
const FACTION_BASE_STRENGTH: f64 = 0.3;

/// Strength added per faction member.
const FACTION_MEMBER_STRENGTH: f64 = 0.1;

/// A territory seed loaded at startup.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TerritorySeed {
    /// Display name.
    pub name: String,
    /// Faction initially in control.
    pub faction: String,
    /// Initial control strength.
    pub control_strength: f64,
    /// Strategic value.
    pub strategic_value: f64,
}

/// Default territory map for a fresh world.
pub fn default_territories() -> Vec<TerritorySeed> {
    vec![
        TerritorySeed {
            name: "North Ridge".to_owned(),
            faction: "guards".to_owned(),
            control_strength: 0.8,
            strategic_value: 0.6,
        },
        TerritorySeed {
            name: "Market Row".to_owned(),
            faction: "traders".to_owned(),
            control_strength: 0.7,
            strategic_value: 0.8,
        },
        TerritorySeed {
            name: "Outer Ruins".to_owned(),
            faction: "outcasts".to_owned(),
            control_strength: 0.5,
            strategic_value: 0.4,
        },
    ]
}

/// Seed territories that do not exist yet.
///
/// # Errors
///
/// Returns [`WorldError::Db`] if a write fails.
pub async fn seed_territories(
    fleet: &Fleet,
    seeds: &[TerritorySeed],
) -> Result<Vec<TerritoryRow>, WorldError> {
    let store = EconomyStore::new(&fleet.deps().pool);
    let mut rows = Vec::with_capacity(seeds.len());
    for seed in seeds {
        rows.push(
            store
                .seed_territory(
                    &seed.name,
                    &seed.faction,
                    seed.control_strength,
                    seed.strategic_value,
                )
                .await?,
        );
    }
    Ok(rows)
}

/// Establish a trade route between two registered agents with random
/// goods, margin and risk.
///
/// # Errors
///
/// Returns [`WorldError::NotFound`] if either agent is unregistered.
pub async fn establish_route(
    fleet: &Fleet,
    from: &AgentId,
    to: &AgentId,
) -> Result<RouteRow, WorldError> {
    fleet.handle(from).await?;
    fleet.handle(to).await?;

    let (goods, margin, risk) = {
        let mut rng = rand::rng();
        (
            GOODS[rng.random_range(0..GOODS.len())],
            rng.random_range(0.1..=0.5),
            rng.random_range(0.05..=0.3),
        )
    };

    let route = EconomyStore::new(&fleet.deps().pool)
        .establish_route(from, to, goods, margin, risk)
        .await?;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::WorldEvents,
        "route_established",
        serde_json::json!({"route_id": route.id, "from": from, "to": to, "goods": route.goods}),
    ));
    Ok(route)
}

/// Execute one trade along a route. Success improves the relation
/// between the endpoint factions.
///
/// # Errors
///
/// Propagates store errors ([`WorldError::Conflict`] for a disrupted
/// route, [`WorldError::NotFound`] for an unknown one).
pub async fn execute_route(fleet: &Fleet, route_id: RouteId) -> Result<TradeOutcome, WorldError> {
    let outcome = EconomyStore::new(&fleet.deps().pool)
        .execute_trade(route_id)
        .await?;

    if outcome.success {
        let from_faction = fleet.faction_of(&outcome.route.from_agent).await;
        let to_faction = fleet.faction_of(&outcome.route.to_agent).await;
        if let (Some(a), Some(b)) = (from_faction, to_faction)
            && a != b
        {
            fleet
                .adjust_faction_relation(&a, &b, TRADE_RELATION_BONUS)
                .await;
        }
    }

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::WorldEvents,
        if outcome.success { "trade_completed" } else { "trade_disrupted" },
        serde_json::json!({
            "route_id": outcome.route.id,
            "success": outcome.success,
            "gold_earned": outcome.gold_earned,
        }),
    ));
    Ok(outcome)
}

/// Initiate a battle for a territory. The attacker's strength derives
/// from its faction's size.
///
/// # Errors
///
/// Propagates [`WorldError::Conflict`] when the attacker already
/// controls the territory.
pub async fn initiate_battle(
    fleet: &Fleet,
    territory_id: TerritoryId,
    attacker_faction: &str,
) -> Result<BattleRow, WorldError> {
    let members = fleet.faction_members(attacker_faction).await.len();
    let strength =
        (FACTION_BASE_STRENGTH + FACTION_MEMBER_STRENGTH * members as f64).clamp(0.0, 1.0);

    let battle = EconomyStore::new(&fleet.deps().pool)
        .initiate_battle(territory_id, attacker_faction, strength)
        .await?;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::TerritoryUpdates,
        "battle_initiated",
        serde_json::json!({
            "battle_id": battle.id,
            "territory_id": battle.territory_id,
            "attacker": battle.attacker_faction,
            "defender": battle.defender_faction,
        }),
    ));
    Ok(battle)
}

/// Resolve a battle and apply the faction-relation fallout.
///
/// # Errors
///
/// Propagates [`WorldError::Conflict`] for an already-resolved battle.
pub async fn resolve_battle(fleet: &Fleet, battle_id: BattleId) -> Result<BattleRow, WorldError> {
    let battle = EconomyStore::new(&fleet.deps().pool)
        .resolve_battle(battle_id)
        .await?;

    // Fighting sours relations regardless of the outcome.
    fleet
        .adjust_faction_relation(
            &battle.attacker_faction,
            &battle.defender_faction,
            BATTLE_RELATION_PENALTY,
        )
        .await;

    fleet.deps().events.emit(WorldEvent::now(
        EventChannel::TerritoryUpdates,
        "battle_resolved",
        serde_json::json!({
            "battle_id": battle.id,
            "territory_id": battle.territory_id,
            "winner": battle.winner,
            "status": battle.status,
        }),
    ));
    Ok(battle)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testutil::{fleet_with_script, FRIENDLY_FRAME};
    use haven_types::BattleStatus;

    #[tokio::test]
    async fn route_establishment_requires_registered_agents() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let result = establish_route(
            &fleet,
            &AgentId::from("ghost"),
            &AgentId::from("nobody"),
        )
        .await;
        assert!(matches!(result, Err(WorldError::NotFound(_))));
    }

    #[tokio::test]
    async fn established_route_has_sane_parameters() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let vera = AgentId::from("vera");
        let mara = AgentId::from("mara");
        fleet.register(&vera, Some("guards")).await.unwrap();
        fleet.register(&mara, Some("traders")).await.unwrap();

        let route = establish_route(&fleet, &vera, &mara).await.unwrap();
        assert!((0.1..=0.5).contains(&route.profit_margin));
        assert!((0.05..=0.3).contains(&route.risk_level));
        assert!(GOODS.contains(&route.goods.as_str()));
    }

    #[tokio::test]
    async fn battle_against_own_territory_is_rejected() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let territories = seed_territories(&fleet, &default_territories()).await.unwrap();
        let ridge = territories
            .iter()
            .find(|t| t.name == "North Ridge")
            .unwrap();

        let result = initiate_battle(&fleet, ridge.id, "guards").await;
        assert!(matches!(result, Err(WorldError::Conflict(_))));
    }

    #[tokio::test]
    async fn resolved_battle_hurts_faction_relations() {
        let (fleet, _store) = fleet_with_script(vec![FRIENDLY_FRAME.to_owned()]).await;
        let territories = seed_territories(&fleet, &default_territories()).await.unwrap();
        let ridge = territories
            .iter()
            .find(|t| t.name == "North Ridge")
            .unwrap();

        let battle = initiate_battle(&fleet, ridge.id, "outcasts").await.unwrap();
        let resolved = resolve_battle(&fleet, battle.id).await.unwrap();
        assert_ne!(resolved.status, BattleStatus::InProgress);
        assert!(resolved.winner.is_some());

        let (score, _) = fleet.faction_relation("guards", "outcasts").await;
        assert!((score - 0.35).abs() < f64::EPSILON);
    }
}
