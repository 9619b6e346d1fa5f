//! Trade routes, territories and territorial battles.
//!
//! Trade routes flip between `active` and `disrupted`: executing a trade
//! rolls the route's risk level; failure disrupts the route, success
//! increments the trade counter and emits gold proportional to the
//! profit margin.
//!
//! Battles resolve by multiplying each side's strength by a uniform
//! random factor -- the defender draws from a narrower, higher band --
//! and comparing. An attacker win transfers territory control with the
//! control strength reset to 0.6.

use chrono::{DateTime, Utc};
use haven_types::{AgentId, BattleId, BattleStatus, RouteId, RouteStatus, TerritoryId};
use rand::Rng;
use sqlx::SqlitePool;

use crate::error::DbError;

/// Gold emitted by a successful trade at a 1.0 profit margin.
const TRADE_BASE_GOLD: f64 = 100.0;

/// Attacker strength multiplier band.
const ATTACKER_ROLL: (f64, f64) = (0.8, 1.2);

/// Defender strength multiplier band (narrower and higher).
const DEFENDER_ROLL: (f64, f64) = (0.95, 1.25);

/// Control strength a territory resets to after changing hands.
const CAPTURED_CONTROL_STRENGTH: f64 = 0.6;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row from the `trade_routes` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct RouteRow {
    /// Route identifier.
    #[sqlx(try_from = "String")]
    pub id: RouteId,
    /// Selling agent.
    #[sqlx(try_from = "String")]
    pub from_agent: AgentId,
    /// Buying agent.
    #[sqlx(try_from = "String")]
    pub to_agent: AgentId,
    /// What is traded.
    pub goods: String,
    /// Profit margin in `[0,1]`.
    pub profit_margin: f64,
    /// Probability of disruption per executed trade.
    pub risk_level: f64,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub status: RouteStatus,
    /// Trades completed so far.
    pub trades_completed: i64,
    /// Total gold emitted by this route.
    pub gold_earned: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A row from the `territories` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct TerritoryRow {
    /// Territory identifier.
    #[sqlx(try_from = "String")]
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// Faction currently in control.
    pub controlling_faction: String,
    /// Grip of the controlling faction in `[0,1]`.
    pub control_strength: f64,
    /// How much the territory matters, in `[0,1]`.
    pub strategic_value: f64,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
}

/// A row from the `battles` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct BattleRow {
    /// Battle identifier.
    #[sqlx(try_from = "String")]
    pub id: BattleId,
    /// Contested territory.
    #[sqlx(try_from = "String")]
    pub territory_id: TerritoryId,
    /// Attacking faction.
    pub attacker_faction: String,
    /// Defending faction.
    pub defender_faction: String,
    /// Attacker strength at initiation.
    pub attacker_strength: f64,
    /// Defender strength at initiation.
    pub defender_strength: f64,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub status: BattleStatus,
    /// Winning faction once resolved.
    pub winner: Option<String>,
    /// Initiation time.
    pub created_at: DateTime<Utc>,
    /// Resolution time.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Outcome of one executed trade.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TradeOutcome {
    /// The route after the trade.
    pub route: RouteRow,
    /// Whether the trade went through.
    pub success: bool,
    /// Gold emitted by this trade (0 on disruption).
    pub gold_earned: i64,
}

// ---------------------------------------------------------------------------
// EconomyStore
// ---------------------------------------------------------------------------

/// Typed operations on trade routes, territories and battles.
pub struct EconomyStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EconomyStore<'a> {
    /// Create an economy store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Trade routes
    // -----------------------------------------------------------------------

    /// Establish a new active route between two agents.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn establish_route(
        &self,
        from: &AgentId,
        to: &AgentId,
        goods: &str,
        profit_margin: f64,
        risk_level: f64,
    ) -> Result<RouteRow, DbError> {
        let id = RouteId::new();
        sqlx::query(
            r"INSERT INTO trade_routes
                (id, from_agent, to_agent, goods, profit_margin, risk_level,
                 status, trades_completed, gold_earned, created_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
        )
        .bind(id.to_string())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(goods)
        .bind(profit_margin.clamp(0.0, 1.0))
        .bind(risk_level.clamp(0.0, 1.0))
        .bind(RouteStatus::Active.as_str())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_route(id).await
    }

    /// Fetch one route.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown route.
    pub async fn get_route(&self, id: RouteId) -> Result<RouteRow, DbError> {
        sqlx::query_as::<_, RouteRow>("SELECT * FROM trade_routes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("trade route {id}")))
    }

    /// List routes, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_routes(&self, status: Option<RouteStatus>) -> Result<Vec<RouteRow>, DbError> {
        let rows = sqlx::query_as::<_, RouteRow>(
            r"SELECT * FROM trade_routes
              WHERE (? IS NULL OR status = ?)
              ORDER BY created_at DESC",
        )
        .bind(status.map(RouteStatus::as_str))
        .bind(status.map(RouteStatus::as_str))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Execute a trade along an active route.
    ///
    /// Rolls the route's risk level: on failure the route flips to
    /// `disrupted` and no gold is emitted; on success the trade counter
    /// increments and gold proportional to the profit margin is added.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown route.
    /// - [`DbError::Conflict`] if the route is disrupted.
    pub async fn execute_trade(&self, id: RouteId) -> Result<TradeOutcome, DbError> {
        let route = self.get_route(id).await?;
        if route.status != RouteStatus::Active {
            return Err(DbError::Conflict(format!(
                "trade route {id} is disrupted; restore it first"
            )));
        }

        let roll: f64 = rand::rng().random_range(0.0..1.0);
        if roll < route.risk_level {
            sqlx::query("UPDATE trade_routes SET status = ? WHERE id = ?")
                .bind(RouteStatus::Disrupted.as_str())
                .bind(id.to_string())
                .execute(self.pool)
                .await?;
            let route = self.get_route(id).await?;
            tracing::debug!(route = %id, "trade disrupted by risk roll");
            return Ok(TradeOutcome {
                route,
                success: false,
                gold_earned: 0,
            });
        }

        let gold = (TRADE_BASE_GOLD * route.profit_margin).round() as i64;
        sqlx::query(
            r"UPDATE trade_routes
              SET trades_completed = trades_completed + 1, gold_earned = gold_earned + ?
              WHERE id = ?",
        )
        .bind(gold)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        let route = self.get_route(id).await?;
        Ok(TradeOutcome {
            route,
            success: true,
            gold_earned: gold,
        })
    }

    /// Mark a route disrupted (attack, sabotage).
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown route.
    /// - [`DbError::Conflict`] if the route is already disrupted.
    pub async fn disrupt_route(&self, id: RouteId) -> Result<RouteRow, DbError> {
        let result = sqlx::query("UPDATE trade_routes SET status = ? WHERE id = ? AND status = ?")
            .bind(RouteStatus::Disrupted.as_str())
            .bind(id.to_string())
            .bind(RouteStatus::Active.as_str())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            self.get_route(id).await?;
            return Err(DbError::Conflict(format!("trade route {id} is already disrupted")));
        }
        self.get_route(id).await
    }

    /// Restore a disrupted route to active.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown route.
    /// - [`DbError::Conflict`] if the route is already active.
    pub async fn restore_route(&self, id: RouteId) -> Result<RouteRow, DbError> {
        let result = sqlx::query("UPDATE trade_routes SET status = ? WHERE id = ? AND status = ?")
            .bind(RouteStatus::Active.as_str())
            .bind(id.to_string())
            .bind(RouteStatus::Disrupted.as_str())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            self.get_route(id).await?;
            return Err(DbError::Conflict(format!("trade route {id} is already active")));
        }
        self.get_route(id).await
    }

    // -----------------------------------------------------------------------
    // Territories
    // -----------------------------------------------------------------------

    /// Seed a territory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the write fails.
    pub async fn seed_territory(
        &self,
        name: &str,
        controlling_faction: &str,
        control_strength: f64,
        strategic_value: f64,
    ) -> Result<TerritoryRow, DbError> {
        if let Some(existing) = self.territory_by_name(name).await? {
            return Ok(existing);
        }
        let id = TerritoryId::new();
        sqlx::query(
            r"INSERT INTO territories (id, name, controlling_faction, control_strength, strategic_value, updated_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(controlling_faction)
        .bind(control_strength.clamp(0.0, 1.0))
        .bind(strategic_value.clamp(0.0, 1.0))
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_territory(id).await
    }

    /// Fetch one territory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown territory.
    pub async fn get_territory(&self, id: TerritoryId) -> Result<TerritoryRow, DbError> {
        sqlx::query_as::<_, TerritoryRow>("SELECT * FROM territories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("territory {id}")))
    }

    /// Look a territory up by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn territory_by_name(&self, name: &str) -> Result<Option<TerritoryRow>, DbError> {
        let row = sqlx::query_as::<_, TerritoryRow>("SELECT * FROM territories WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// All territories with their control state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn territory_control(&self) -> Result<Vec<TerritoryRow>, DbError> {
        let rows = sqlx::query_as::<_, TerritoryRow>("SELECT * FROM territories ORDER BY name")
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Battles
    // -----------------------------------------------------------------------

    /// Initiate a battle over a territory.
    ///
    /// The defender's strength is the territory's current control
    /// strength.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown territory.
    /// - [`DbError::Conflict`] if the attacker already controls it.
    pub async fn initiate_battle(
        &self,
        territory_id: TerritoryId,
        attacker_faction: &str,
        attacker_strength: f64,
    ) -> Result<BattleRow, DbError> {
        let territory = self.get_territory(territory_id).await?;
        if territory.controlling_faction == attacker_faction {
            return Err(DbError::Conflict(format!(
                "{attacker_faction} already controls {}",
                territory.name
            )));
        }

        let id = BattleId::new();
        sqlx::query(
            r"INSERT INTO battles
                (id, territory_id, attacker_faction, defender_faction,
                 attacker_strength, defender_strength, status, winner, created_at, resolved_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL)",
        )
        .bind(id.to_string())
        .bind(territory_id.to_string())
        .bind(attacker_faction)
        .bind(&territory.controlling_faction)
        .bind(attacker_strength.clamp(0.0, 1.0))
        .bind(territory.control_strength)
        .bind(BattleStatus::InProgress.as_str())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        self.get_battle(id).await
    }

    /// Fetch one battle.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown battle.
    pub async fn get_battle(&self, id: BattleId) -> Result<BattleRow, DbError> {
        sqlx::query_as::<_, BattleRow>("SELECT * FROM battles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("battle {id}")))
    }

    /// Resolve an in-progress battle.
    ///
    /// Each side's strength is multiplied by a uniform factor (the
    /// defender draws from a narrower, higher band); the larger product
    /// wins. On an attacker win the territory transfers with control
    /// strength reset to 0.6.
    ///
    /// # Errors
    ///
    /// - [`DbError::NotFound`] for an unknown battle.
    /// - [`DbError::Conflict`] if the battle is already resolved.
    pub async fn resolve_battle(&self, id: BattleId) -> Result<BattleRow, DbError> {
        let battle = self.get_battle(id).await?;
        if battle.status != BattleStatus::InProgress {
            return Err(DbError::Conflict(format!("battle {id} is already resolved")));
        }

        let (attacker_roll, defender_roll) = {
            let mut rng = rand::rng();
            (
                battle.attacker_strength * rng.random_range(ATTACKER_ROLL.0..=ATTACKER_ROLL.1),
                battle.defender_strength * rng.random_range(DEFENDER_ROLL.0..=DEFENDER_ROLL.1),
            )
        };

        let attacker_won = attacker_roll > defender_roll;
        let (status, winner) = if attacker_won {
            (BattleStatus::AttackerWon, battle.attacker_faction.clone())
        } else {
            (BattleStatus::DefenderWon, battle.defender_faction.clone())
        };

        sqlx::query("UPDATE battles SET status = ?, winner = ?, resolved_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&winner)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(self.pool)
            .await?;

        if attacker_won {
            sqlx::query(
                r"UPDATE territories
                  SET controlling_faction = ?, control_strength = ?, updated_at = ?
                  WHERE id = ?",
            )
            .bind(&battle.attacker_faction)
            .bind(CAPTURED_CONTROL_STRENGTH)
            .bind(Utc::now())
            .bind(battle.territory_id.to_string())
            .execute(self.pool)
            .await?;
            tracing::info!(
                battle = %id,
                territory = %battle.territory_id,
                winner = %winner,
                "territory changed hands"
            );
        }

        self.get_battle(id).await
    }

    /// Battle history, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_battles(&self) -> Result<Vec<BattleRow>, DbError> {
        let rows = sqlx::query_as::<_, BattleRow>("SELECT * FROM battles ORDER BY created_at DESC")
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

    fn merchant() -> AgentId {
        AgentId::from("merchant")
    }

    fn vera() -> AgentId {
        AgentId::from("vera")
    }

    #[tokio::test]
    async fn riskless_trade_always_succeeds() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let route = economy
            .establish_route(&merchant(), &vera(), "salvage", 0.4, 0.0)
            .await
            .unwrap();

        let outcome = economy.execute_trade(route.id).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.gold_earned, 40);
        assert_eq!(outcome.route.trades_completed, 1);
        assert_eq!(outcome.route.status, RouteStatus::Active);
    }

    #[tokio::test]
    async fn certain_risk_disrupts_the_route() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let route = economy
            .establish_route(&merchant(), &vera(), "salvage", 0.4, 1.0)
            .await
            .unwrap();

        let outcome = economy.execute_trade(route.id).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.gold_earned, 0);
        assert_eq!(outcome.route.status, RouteStatus::Disrupted);

        // Executing a disrupted route is a conflict.
        let again = economy.execute_trade(route.id).await;
        assert!(matches!(again, Err(DbError::Conflict(_))));

        // Restore flips it back.
        let restored = economy.restore_route(route.id).await.unwrap();
        assert_eq!(restored.status, RouteStatus::Active);
    }

    #[tokio::test]
    async fn disrupt_and_restore_enforce_current_status() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let route = economy
            .establish_route(&merchant(), &vera(), "grain", 0.2, 0.1)
            .await
            .unwrap();

        economy.disrupt_route(route.id).await.unwrap();
        assert!(matches!(
            economy.disrupt_route(route.id).await,
            Err(DbError::Conflict(_))
        ));
        economy.restore_route(route.id).await.unwrap();
        assert!(matches!(
            economy.restore_route(route.id).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn attacking_own_territory_is_a_conflict() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let territory = economy
            .seed_territory("North Ridge", "guards", 0.8, 0.6)
            .await
            .unwrap();

        let result = economy.initiate_battle(territory.id, "guards", 0.9).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
        assert!(economy.list_battles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overwhelming_attacker_takes_the_territory() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let territory = economy
            .seed_territory("North Ridge", "guards", 0.01, 0.6)
            .await
            .unwrap();

        let battle = economy
            .initiate_battle(territory.id, "outcasts", 1.0)
            .await
            .unwrap();
        assert_eq!(battle.status, BattleStatus::InProgress);

        // Attacker roll is at least 0.8, defender at most 0.0125.
        let resolved = economy.resolve_battle(battle.id).await.unwrap();
        assert_eq!(resolved.status, BattleStatus::AttackerWon);
        assert_eq!(resolved.winner.as_deref(), Some("outcasts"));

        let after = economy.get_territory(territory.id).await.unwrap();
        assert_eq!(after.controlling_faction, "outcasts");
        assert!((after.control_strength - 0.6).abs() < f64::EPSILON);

        // Double resolution is a conflict.
        assert!(matches!(
            economy.resolve_battle(battle.id).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn hopeless_attacker_loses_and_control_stays() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let territory = economy
            .seed_territory("South Gate", "guards", 1.0, 0.9)
            .await
            .unwrap();

        let battle = economy
            .initiate_battle(territory.id, "outcasts", 0.01)
            .await
            .unwrap();
        let resolved = economy.resolve_battle(battle.id).await.unwrap();
        assert_eq!(resolved.status, BattleStatus::DefenderWon);

        let after = economy.get_territory(territory.id).await.unwrap();
        assert_eq!(after.controlling_faction, "guards");
    }

    #[tokio::test]
    async fn seed_territory_is_idempotent_by_name() {
        let store = Store::open_in_memory().await.unwrap();
        let economy = EconomyStore::new(store.pool());
        let first = economy
            .seed_territory("Market Row", "traders", 0.7, 0.5)
            .await
            .unwrap();
        let second = economy
            .seed_territory("Market Row", "guards", 0.2, 0.2)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.controlling_faction, "traders");
    }
}
