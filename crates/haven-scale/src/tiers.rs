//! Tiered update scheduling.
//!
//! Agents are assigned one of four update tiers derived from wall time
//! since their last interaction. A tick advances a global counter and
//! returns exactly the agents whose tier-modulo divides the counter, so
//! dormant agents cost 1/100th of the updates an active agent does.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use haven_types::{AgentId, UpdateTier};

struct Inner {
    tick: u64,
    last_interaction: HashMap<AgentId, Instant>,
}

/// Assigns tiers and computes per-tick update sets.
///
/// The scheduler is the exclusive owner of tier assignments; everyone
/// else reads tiers through it.
pub struct TieredScheduler {
    inner: Mutex<Inner>,
}

impl TieredScheduler {
    /// Create an empty scheduler at tick 0.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tick: 0,
                last_interaction: HashMap::new(),
            }),
        }
    }

    /// Track an agent. Registration counts as an interaction, so new
    /// agents start in the active tier.
    pub fn register(&self, agent: AgentId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_interaction.insert(agent, Instant::now());
        }
    }

    /// Stop tracking an agent.
    pub fn remove(&self, agent: &AgentId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_interaction.remove(agent);
        }
    }

    /// Record an interaction, promoting the agent back to active.
    pub fn touch(&self, agent: &AgentId) {
        if let Ok(mut inner) = self.inner.lock()
            && let Some(at) = inner.last_interaction.get_mut(agent)
        {
            *at = Instant::now();
        }
    }

    /// The agent's current tier, or `None` if untracked.
    pub fn tier_of(&self, agent: &AgentId) -> Option<UpdateTier> {
        self.tier_of_at(agent, Instant::now())
    }

    /// Tier relative to an explicit `now` (test hook).
    pub fn tier_of_at(&self, agent: &AgentId, now: Instant) -> Option<UpdateTier> {
        let inner = self.inner.lock().ok()?;
        let at = inner.last_interaction.get(agent)?;
        let idle = now.saturating_duration_since(*at);
        Some(UpdateTier::from_idle_seconds(idle.as_secs()))
    }

    /// Advance the global counter and return the agents due this tick.
    pub fn tick(&self) -> Vec<AgentId> {
        self.tick_at(Instant::now())
    }

    /// [`Self::tick`] relative to an explicit `now` (test hook).
    pub fn tick_at(&self, now: Instant) -> Vec<AgentId> {
        let Ok(mut inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner.tick += 1;
        let tick = inner.tick;

        inner
            .last_interaction
            .iter()
            .filter(|(_, at)| {
                let idle = now.saturating_duration_since(**at);
                let tier = UpdateTier::from_idle_seconds(idle.as_secs());
                tick % tier.modulo() == 0
            })
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    /// The current global tick counter.
    pub fn current_tick(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.tick)
    }

    /// Tier distribution across all tracked agents.
    pub fn distribution(&self) -> HashMap<UpdateTier, usize> {
        self.distribution_at(Instant::now())
    }

    /// [`Self::distribution`] relative to an explicit `now` (test hook).
    pub fn distribution_at(&self, now: Instant) -> HashMap<UpdateTier, usize> {
        let mut counts = HashMap::new();
        if let Ok(inner) = self.inner.lock() {
            for at in inner.last_interaction.values() {
                let idle = now.saturating_duration_since(*at);
                let tier = UpdateTier::from_idle_seconds(idle.as_secs());
                *counts.entry(tier).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Number of tracked agents.
    pub fn tracked(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.last_interaction.len())
    }
}

impl Default for TieredScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// Test hook: lets tests age an agent without sleeping.
#[cfg(test)]
impl TieredScheduler {
    fn backdate(&self, agent: &AgentId, by: std::time::Duration) {
        if let Ok(mut inner) = self.inner.lock()
            && let Some(at) = inner.last_interaction.get_mut(agent)
        {
            *at = Instant::now() - by;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use super::*;

    #[test]
    fn new_agents_are_active_and_updated_every_tick() {
        let scheduler = TieredScheduler::new();
        let vera = AgentId::from("vera");
        scheduler.register(vera.clone());

        assert_eq!(scheduler.tier_of(&vera), Some(UpdateTier::Active));
        for _ in 0..5 {
            let due = scheduler.tick();
            assert!(due.contains(&vera));
        }
    }

    #[test]
    fn idle_agents_are_due_only_on_their_modulo() {
        let scheduler = TieredScheduler::new();
        let vera = AgentId::from("vera");
        scheduler.register(vera.clone());
        scheduler.backdate(&vera, Duration::from_secs(600)); // idle tier, modulo 20

        for tick in 1..=40u64 {
            let due = scheduler.tick();
            assert_eq!(
                due.contains(&vera),
                tick % 20 == 0,
                "tick {tick}: unexpected membership"
            );
        }
    }

    #[test]
    fn dormant_agents_are_nearly_silent() {
        let scheduler = TieredScheduler::new();
        let vera = AgentId::from("vera");
        scheduler.register(vera.clone());
        scheduler.backdate(&vera, Duration::from_secs(7200)); // dormant, modulo 100

        let mut updates = 0;
        for _ in 0..200 {
            if scheduler.tick().contains(&vera) {
                updates += 1;
            }
        }
        assert_eq!(updates, 2);
    }

    #[test]
    fn touch_promotes_back_to_active() {
        let scheduler = TieredScheduler::new();
        let vera = AgentId::from("vera");
        scheduler.register(vera.clone());
        scheduler.backdate(&vera, Duration::from_secs(7200));
        assert_eq!(scheduler.tier_of(&vera), Some(UpdateTier::Dormant));

        scheduler.touch(&vera);
        assert_eq!(scheduler.tier_of(&vera), Some(UpdateTier::Active));
    }

    #[test]
    fn removed_agents_never_appear() {
        let scheduler = TieredScheduler::new();
        let vera = AgentId::from("vera");
        scheduler.register(vera.clone());
        scheduler.remove(&vera);

        assert_eq!(scheduler.tier_of(&vera), None);
        assert!(scheduler.tick().is_empty());
    }

    #[test]
    fn distribution_counts_tiers() {
        let scheduler = TieredScheduler::new();
        scheduler.register(AgentId::from("a"));
        scheduler.register(AgentId::from("b"));
        let b = AgentId::from("b");
        scheduler.backdate(&b, Duration::from_secs(120));

        let dist = scheduler.distribution();
        assert_eq!(dist.get(&UpdateTier::Active), Some(&1));
        assert_eq!(dist.get(&UpdateTier::Nearby), Some(&1));
    }
}
