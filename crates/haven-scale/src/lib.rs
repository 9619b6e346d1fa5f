//! Scaling substrate for the Haven NPC runtime.
//!
//! The pieces that keep CPU and database pressure bounded as the agent
//! count grows:
//!
//! - [`cache`] -- TTL + LRU hot cache with hit/miss counters
//! - [`tiers`] -- tiered update scheduling (active/nearby/idle/dormant)
//! - [`batch`] -- write coalescing under one transaction
//! - [`perf`] -- per-metric sample rings with percentiles
//!
//! The cache is advisory; the SQLite store in `haven-db` stays the
//! system of record, and writers invalidate the matching key prefix.

pub mod batch;
pub mod cache;
pub mod perf;
pub mod tiers;

pub use batch::{AgentStats, BatchWriter, PendingWrite};
pub use cache::{CacheStats, TtlCache};
pub use perf::{MetricReport, PerfMonitor, PerfTimer};
pub use tiers::TieredScheduler;
