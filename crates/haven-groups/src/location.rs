//! Entity locations and proximity queries.
//!
//! The game engine streams position updates for agents and players;
//! "nearby" is plain Euclidean 3D distance within a threshold. Zones
//! are opaque labels usable for coarse queries.

use std::collections::HashMap;
use std::sync::Mutex;

use haven_types::{AgentId, PlayerId};
use serde::{Deserialize, Serialize};

/// A tracked position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityLocation {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl EntityLocation {
    /// Euclidean 3D distance to another location.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    location: EntityLocation,
    zone: String,
}

/// Position index for agents and players.
#[derive(Default)]
pub struct LocationIndex {
    agents: Mutex<HashMap<AgentId, Tracked>>,
    players: Mutex<HashMap<PlayerId, Tracked>>,
}

impl LocationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent's position.
    pub fn update_agent(&self, agent: AgentId, location: EntityLocation, zone: &str) {
        if let Ok(mut agents) = self.agents.lock() {
            agents.insert(
                agent,
                Tracked {
                    location,
                    zone: zone.to_owned(),
                },
            );
        }
    }

    /// Record a player's position.
    pub fn update_player(&self, player: PlayerId, location: EntityLocation, zone: &str) {
        if let Ok(mut players) = self.players.lock() {
            players.insert(
                player,
                Tracked {
                    location,
                    zone: zone.to_owned(),
                },
            );
        }
    }

    /// A player's last known position.
    pub fn player_location(&self, player: &PlayerId) -> Option<EntityLocation> {
        self.players
            .lock()
            .ok()
            .and_then(|players| players.get(player).map(|t| t.location))
    }

    /// An agent's last known position and zone.
    pub fn agent_location(&self, agent: &AgentId) -> Option<(EntityLocation, String)> {
        self.agents
            .lock()
            .ok()
            .and_then(|agents| agents.get(agent).map(|t| (t.location, t.zone.clone())))
    }

    /// Agents within `max_distance` of the player, nearest first,
    /// capped at `cap`. Unknown player position yields an empty list.
    pub fn nearby_agents(
        &self,
        player: &PlayerId,
        max_distance: f64,
        cap: usize,
    ) -> Vec<(AgentId, f64)> {
        let Some(origin) = self.player_location(player) else {
            return Vec::new();
        };
        let Ok(agents) = self.agents.lock() else {
            return Vec::new();
        };

        let mut nearby: Vec<(AgentId, f64)> = agents
            .iter()
            .filter_map(|(id, tracked)| {
                let distance = origin.distance_to(&tracked.location);
                (distance <= max_distance).then(|| (id.clone(), distance))
            })
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby.truncate(cap);
        nearby
    }

    /// Agents currently in a zone.
    pub fn agents_in_zone(&self, zone: &str) -> Vec<AgentId> {
        self.agents.lock().map_or_else(
            |_| Vec::new(),
            |agents| {
                agents
                    .iter()
                    .filter(|(_, t)| t.zone == zone)
                    .map(|(id, _)| id.clone())
                    .collect()
            },
        )
    }

    /// Number of tracked agent and player positions.
    pub fn tracked_counts(&self) -> (usize, usize) {
        let agents = self.agents.lock().map_or(0, |a| a.len());
        let players = self.players.lock().map_or(0, |p| p.len());
        (agents, players)
    }
}
