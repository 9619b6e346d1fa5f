//! Shared application state for the observer surface.

use std::sync::Arc;

use haven_db::Store;
use haven_events::EventBus;
use haven_groups::GroupManager;
use haven_scale::{BatchWriter, PerfMonitor, TtlCache};
use haven_world::{Fleet, World};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppState {
    /// The persistent store.
    pub store: Store,
    /// The agent fleet.
    pub fleet: Arc<Fleet>,
    /// The world tick driver.
    pub world: Arc<World>,
    /// Conversation groups.
    pub groups: Arc<GroupManager>,
    /// The event bus.
    pub events: Arc<EventBus>,
    /// Advisory hot cache.
    pub cache: TtlCache,
    /// Batched write coalescing.
    pub batch: BatchWriter,
    /// Performance monitor.
    pub perf: PerfMonitor,
}

impl AppState {
    /// Assemble the state over already-constructed services.
    pub fn new(
        store: Store,
        fleet: Arc<Fleet>,
        world: Arc<World>,
        groups: Arc<GroupManager>,
        events: Arc<EventBus>,
    ) -> Self {
        let batch = BatchWriter::new(store.pool().clone());
        Self {
            store,
            fleet,
            world,
            groups,
            events,
            cache: TtlCache::new(),
            batch,
            perf: PerfMonitor::new(),
        }
    }
}
