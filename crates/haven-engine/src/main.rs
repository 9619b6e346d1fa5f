//! Haven engine: constructs every service once and serves the API.
//!
//! Startup order: logging, config, store (+ migrations), model backend,
//! prompt engine, event bus, fleet, territories, world, conversation
//! groups, HTTP surface. Shutdown (ctrl-c) stops the world tick and
//! closes the pool.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use haven_agents::{AgentConfig, AgentDeps, PersonaRegistry};
use haven_db::{Store, StoreConfig};
use haven_events::EventBus;
use haven_groups::GroupManager;
use haven_llm::{BackendConfig, LlmBackend, PromptEngine};
use haven_observer::AppState;
use haven_scale::TieredScheduler;
use haven_world::{default_territories, seed_territories, Fleet, World};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("HAVEN_CONFIG").unwrap_or_else(|_| "haven-config.yaml".to_owned());
    let config = EngineConfig::load(&config_path).context("loading configuration")?;

    // Persistent store.
    let store = Store::connect(
        &StoreConfig::new(&config.store.path).with_max_connections(config.store.max_connections),
    )
    .await
    .context("connecting to sqlite store")?;
    store.run_migrations().await.context("running migrations")?;

    // Model backend. A missing key is a warning, not a crash: cycles
    // degrade to the fallback frame until a key is provided.
    let api_key = std::env::var(&config.llm.api_key_env).unwrap_or_else(|_| {
        warn!(env = %config.llm.api_key_env, "model API key not set; cycles will degrade");
        String::new()
    });
    let llm = LlmBackend::from_config(&BackendConfig {
        kind: config.llm.kind,
        api_url: config.llm.api_url.clone(),
        api_key,
        model: config.llm.model.clone(),
    });

    let events = Arc::new(EventBus::new());
    let deps = AgentDeps {
        pool: store.pool().clone(),
        llm: Arc::new(llm),
        prompts: Arc::new(PromptEngine::new().context("building prompt engine")?),
        events: Arc::clone(&events),
        config: AgentConfig {
            reflection_interval: Duration::from_secs(config.agents.reflection_interval_secs),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            rumor_probability: config.agents.rumor_probability,
            ..AgentConfig::default()
        },
    };

    let fleet = Arc::new(Fleet::new(
        deps,
        Arc::new(PersonaRegistry::new()),
        Arc::new(TieredScheduler::new()),
        Arc::clone(&events),
    ));

    let territories = config.territories.unwrap_or_else(default_territories);
    let seeded = seed_territories(&fleet, &territories)
        .await
        .context("seeding territories")?;
    info!(count = seeded.len(), "territories seeded");

    let world = Arc::new(World::new(Arc::clone(&fleet)));
    if config.world.autostart {
        world
            .start(
                config.world.time_scale,
                Duration::from_secs_f64(config.world.tick_interval_secs),
            )
            .await;
    }

    let groups = Arc::new(GroupManager::new(Arc::clone(&fleet)));
    let state = Arc::new(AppState::new(
        store.clone(),
        Arc::clone(&fleet),
        Arc::clone(&world),
        groups,
        events,
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;

    tokio::select! {
        result = haven_observer::serve(state, addr) => {
            result.context("observer server")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    world.stop().await;
    for agent in fleet.agent_ids().await {
        if let Err(e) = fleet.unregister(&agent).await {
            warn!(agent = %agent, error = %e, "agent did not stop cleanly");
        }
    }
    store.close().await;
    info!("engine stopped");
    Ok(())
}
