//! World events and the broadcast bus.
//!
//! Every noteworthy world change (gossip fired, quest generated, battle
//! resolved, ...) becomes a [`WorldEvent`]: a channel tag, a kind, a
//! JSON payload and a timestamp. Events are retained in a bounded ring
//! (the last 50) for polling surfaces, and published over a tokio
//! broadcast channel for live subscribers.
//!
//! Delivery is best-effort and unordered across subscribers; a single
//! subscriber sees events in emission order. A lagging subscriber loses
//! the oldest events (broadcast semantics), never blocks the emitter.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events retained for polling.
const RING_CAPACITY: usize = 50;

/// Broadcast channel depth per subscriber.
const CHANNEL_CAPACITY: usize = 256;

/// Subscription channel an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    /// General world happenings (gossip, decay sweeps, world ticks).
    WorldEvents,
    /// Faction trust and membership changes.
    FactionUpdates,
    /// Territory control changes and battles.
    TerritoryUpdates,
    /// Quest generation and transitions.
    QuestUpdates,
}

impl EventChannel {
    /// Wire name used by subscribe requests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldEvents => "world_events",
            Self::FactionUpdates => "faction_updates",
            Self::TerritoryUpdates => "territory_updates",
            Self::QuestUpdates => "quest_updates",
        }
    }

    /// Parse a wire name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "world_events" => Some(Self::WorldEvents),
            "faction_updates" => Some(Self::FactionUpdates),
            "territory_updates" => Some(Self::TerritoryUpdates),
            "quest_updates" => Some(Self::QuestUpdates),
            _ => None,
        }
    }
}

/// One emitted world event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Which subscription channel carries it.
    pub channel: EventChannel,
    /// Event kind tag ("gossip", "quest_generated", "battle_resolved", ...).
    pub kind: String,
    /// Structured payload.
    pub payload: serde_json::Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl WorldEvent {
    /// Build an event stamped with the current time.
    pub fn now(channel: EventChannel, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel,
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// The event bus: bounded ring + broadcast fan-out.
pub struct EventBus {
    sender: broadcast::Sender<WorldEvent>,
    ring: Mutex<VecDeque<WorldEvent>>,
}

impl EventBus {
    /// Create a bus with the default capacities.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
        }
    }

    /// Emit an event: retain it in the ring and fan out to live
    /// subscribers. Emission never fails; with no subscribers the
    /// broadcast send error is ignored.
    pub fn emit(&self, event: WorldEvent) {
        if let Ok(mut ring) = self.ring.lock() {
            if ring.len() == RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
        tracing::debug!(channel = event.channel.as_str(), kind = %event.kind, "event emitted");
        let _ = self.sender.send(event);
    }

    /// The most recent events, newest last, capped at `limit`.
    pub fn recent(&self, limit: usize) -> Vec<WorldEvent> {
        self.ring.lock().map_or_else(
            |_| Vec::new(),
            |ring| {
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            },
        )
    }

    /// Subscribe to the live stream.
    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
