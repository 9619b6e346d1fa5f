//! The world tick: periodic maintenance and emission loop.
//!
//! A running world advances simulated time by `wall_elapsed *
//! time_scale` every tick, applies hourly-scaled memory decay, cleans
//! up forgotten memories, expires stale quests, occasionally fires
//! gossip between two agents or hands an agent a quest, and advances
//! the tier scheduler. Tick errors are logged and never stop the loop.
//!
//! [`World::advance`] is the deterministic fast-forward used by tests
//! and admin surfaces: the same maintenance, driven by an explicit hour
//! count, with the per-tick probabilities scaled as
//! `min(cap, hours * base_rate)`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use haven_db::{EconomyStore, QuestStore, TopicStore, CLEANUP_THRESHOLD};
use haven_events::{EventChannel, WorldEvent};
use haven_types::{GoalStatus, RouteStatus};
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::error::WorldError;
use crate::gossip::gossip;
use crate::quests::generate_quest;
use crate::registry::Fleet;

/// Per-tick probability of a gossip exchange.
const GOSSIP_CHANCE: f64 = 0.3;

/// Per-tick probability of quest generation.
const QUEST_CHANCE: f64 = 0.1;

/// Fast-forward cap on the gossip probability.
const GOSSIP_CAP: f64 = 0.5;

/// Fast-forward cap on the trade probability.
const TRADE_CAP: f64 = 0.4;

/// Fast-forward trade base rate per hour.
const TRADE_RATE: f64 = 0.1;

/// Goal progress per simulated hour during fast-forward.
const GOAL_PROGRESS_PER_HOUR: f64 = 0.01;

/// What one tick (or fast-forward) did.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct TickReport {
    /// Simulated hours this step covered.
    pub sim_hours: f64,
    /// Topics whose strength decayed.
    pub topics_decayed: u64,
    /// Memories permanently removed.
    pub memories_cleaned: u64,
    /// Quests expired.
    pub quests_expired: u64,
    /// Whether gossip fired.
    pub gossip_fired: bool,
    /// Whether a quest was generated.
    pub quest_generated: bool,
    /// Whether a trade executed.
    pub trade_executed: bool,
    /// Goals that progressed.
    pub goals_progressed: u64,
    /// Agents due for update this tick.
    pub agents_updated: usize,
}

/// Public world status.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct WorldStatus {
    /// Whether the tick loop is running.
    pub running: bool,
    /// Total simulated hours elapsed.
    pub sim_hours: f64,
    /// Simulated seconds per wall second.
    pub time_scale: f64,
    /// Wall seconds between ticks.
    pub tick_interval_secs: f64,
    /// Ticks executed so far.
    pub tick_count: u64,
}

struct WorldState {
    running: bool,
    time_scale: f64,
    tick_interval: Duration,
    sim_hours: f64,
    tick_count: u64,
    last_tick: Option<Instant>,
    shutdown: Option<watch::Sender<bool>>,
}

/// The world simulation driver.
pub struct World {
    fleet: Arc<Fleet>,
    state: Mutex<WorldState>,
}

impl World {
    /// Create a stopped world over a fleet.
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            fleet,
            state: Mutex::new(WorldState {
                running: false,
                time_scale: 60.0,
                tick_interval: Duration::from_secs(60),
                sim_hours: 0.0,
                tick_count: 0,
                last_tick: None,
                shutdown: None,
            }),
        }
    }

    /// The fleet this world drives.
    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    /// Start the periodic tick loop.
    ///
    /// `time_scale` is simulated seconds per wall second;
    /// `tick_interval` is the wall time between ticks. Starting an
    /// already-running world just updates both parameters.
    pub async fn start(self: &Arc<Self>, time_scale: f64, tick_interval: Duration) {
        let mut state = self.state.lock().await;
        state.time_scale = time_scale.max(0.0);
        state.tick_interval = tick_interval.max(Duration::from_millis(100));
        if state.running {
            return;
        }
        state.running = true;
        state.last_tick = Some(Instant::now());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        state.shutdown = Some(shutdown_tx);
        drop(state);

        let world = Arc::clone(self);
        tokio::spawn(async move {
            info!("world tick loop started");
            loop {
                let interval = {
                    let state = world.state.lock().await;
                    state.tick_interval
                };
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = world.tick().await {
                            // Tick errors never stop the loop.
                            error!(error = %e, "world tick failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("world tick loop stopped");
        });
    }

    /// Stop the tick loop.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.running = false;
        if let Some(shutdown) = state.shutdown.take() {
            let _ = shutdown.send(true);
        }
    }

    /// Current status.
    pub async fn status(&self) -> WorldStatus {
        let state = self.state.lock().await;
        WorldStatus {
            running: state.running,
            sim_hours: state.sim_hours,
            time_scale: state.time_scale,
            tick_interval_secs: state.tick_interval.as_secs_f64(),
            tick_count: state.tick_count,
        }
    }

    /// Run one tick now (also the manual-tick surface).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if a maintenance step fails; probabilistic
    /// steps log-and-continue instead.
    pub async fn tick(&self) -> Result<TickReport, WorldError> {
        let (sim_hours, tick_count) = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let wall_elapsed = state
                .last_tick
                .map_or_else(|| state.tick_interval, |at| now.duration_since(at));
            state.last_tick = Some(now);
            let hours = wall_elapsed.as_secs_f64() * state.time_scale / 3600.0;
            state.sim_hours += hours;
            state.tick_count += 1;
            (hours, state.tick_count)
        };

        let mut report = self.maintenance(sim_hours).await?;

        // Probabilistic steps: 30% gossip, 10% quest generation.
        let (gossip_roll, quest_roll): (f64, f64) = {
            let mut rng = rand::rng();
            (rng.random(), rng.random())
        };
        if gossip_roll < GOSSIP_CHANCE {
            report.gossip_fired = self.fire_random_gossip().await;
        }
        if quest_roll < QUEST_CHANCE {
            report.quest_generated = self.fire_random_quest().await;
        }

        let due = self.fleet.scheduler().tick();
        report.agents_updated = due.len();

        self.fleet.deps().events.emit(WorldEvent::now(
            EventChannel::WorldEvents,
            "world_tick",
            serde_json::json!({
                "tick": tick_count,
                "sim_hours": report.sim_hours,
                "memories_cleaned": report.memories_cleaned,
                "agents_updated": report.agents_updated,
            }),
        ));
        Ok(report)
    }

    /// Deterministic fast-forward over `hours` of simulated time.
    ///
    /// Applies decay, cleanup, quest expiration and goal progress for
    /// the full span; gossip and trade fire with probability
    /// `min(cap, hours * base_rate)`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if a maintenance step fails.
    pub async fn advance(&self, hours: f64) -> Result<TickReport, WorldError> {
        let hours = hours.max(0.0);
        {
            let mut state = self.state.lock().await;
            state.sim_hours += hours;
        }

        let mut report = self.maintenance(hours).await?;
        report.goals_progressed = self.progress_goals(hours).await?;

        let (gossip_roll, trade_roll): (f64, f64) = {
            let mut rng = rand::rng();
            (rng.random(), rng.random())
        };
        if gossip_roll < (hours * GOSSIP_CHANCE).min(GOSSIP_CAP) {
            report.gossip_fired = self.fire_random_gossip().await;
        }
        if trade_roll < (hours * TRADE_RATE).min(TRADE_CAP) {
            report.trade_executed = self.fire_random_trade().await;
        }

        self.fleet.deps().events.emit(WorldEvent::now(
            EventChannel::WorldEvents,
            "world_advanced",
            serde_json::json!({
                "hours": hours,
                "memories_cleaned": report.memories_cleaned,
                "quests_expired": report.quests_expired,
            }),
        ));
        Ok(report)
    }

    /// The deterministic maintenance block shared by tick and advance.
    async fn maintenance(&self, hours: f64) -> Result<TickReport, WorldError> {
        let pool = &self.fleet.deps().pool;
        let topics = TopicStore::new(pool);

        let decayed = topics.decay(hours).await?;
        let cleaned = topics.cleanup(CLEANUP_THRESHOLD).await?;
        let expired = QuestStore::new(pool)
            .expire_stale(Utc::now() + ChronoDuration::seconds((hours * 3600.0) as i64))
            .await?;

        Ok(TickReport {
            sim_hours: hours,
            topics_decayed: decayed.topics_decayed,
            memories_cleaned: cleaned.topics_removed + cleaned.shared_removed,
            quests_expired: expired,
            ..TickReport::default()
        })
    }

    /// Pick two distinct agents and gossip. Returns whether it ran.
    async fn fire_random_gossip(&self) -> bool {
        let ids = self.fleet.agent_ids().await;
        if ids.len() < 2 {
            return false;
        }
        let (i, j) = {
            let mut rng = rand::rng();
            let i = rng.random_range(0..ids.len());
            let mut j = rng.random_range(0..ids.len() - 1);
            if j >= i {
                j += 1;
            }
            (i, j)
        };
        match gossip(&self.fleet, &ids[i], &ids[j]).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "scheduled gossip failed");
                false
            }
        }
    }

    /// Pick one agent and generate a quest. Returns whether it ran.
    async fn fire_random_quest(&self) -> bool {
        let ids = self.fleet.agent_ids().await;
        if ids.is_empty() {
            return false;
        }
        let giver = {
            let mut rng = rand::rng();
            ids[rng.random_range(0..ids.len())].clone()
        };
        match generate_quest(&self.fleet, &giver, None).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "scheduled quest generation failed");
                false
            }
        }
    }

    /// Execute one random active trade route. Returns whether it ran.
    async fn fire_random_trade(&self) -> bool {
        let store = EconomyStore::new(&self.fleet.deps().pool);
        let routes = match store.list_routes(Some(RouteStatus::Active)).await {
            Ok(routes) if !routes.is_empty() => routes,
            _ => return false,
        };
        let route_id = {
            let mut rng = rand::rng();
            routes[rng.random_range(0..routes.len())].id
        };
        crate::economy::execute_route(&self.fleet, route_id).await.is_ok()
    }

    /// Advance every registered agent's active goals.
    async fn progress_goals(&self, hours: f64) -> Result<u64, WorldError> {
        let delta = hours * GOAL_PROGRESS_PER_HOUR;
        if delta <= 0.0 {
            return Ok(0);
        }
        let store = QuestStore::new(&self.fleet.deps().pool);
        let mut progressed = 0;
        for agent in self.fleet.agent_ids().await {
            for goal in store.goals_for(&agent, Some(GoalStatus::Active)).await? {
                store.progress_goal(goal.id, delta).await?;
                progressed += 1;
            }
        }
        Ok(progressed)
    }
}
