//! Configuration loading for the engine binary.
//!
//! The canonical configuration lives in `haven-config.yaml` next to the
//! binary (overridable via `HAVEN_CONFIG`). Every field has a default,
//! so a missing file yields a fully usable local setup. The model API
//! key is never read from the file -- only from the environment
//! variable the config names.

use std::path::Path;

use haven_llm::BackendKind;
use haven_world::TerritorySeed;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent store settings.
    #[serde(default)]
    pub store: StoreSection,

    /// Language-model backend settings.
    #[serde(default)]
    pub llm: LlmSection,

    /// World tick settings.
    #[serde(default)]
    pub world: WorldSection,

    /// Agent runtime tunables.
    #[serde(default)]
    pub agents: AgentsSection,

    /// Territories seeded at startup (defaults to the built-in map).
    #[serde(default)]
    pub territories: Option<Vec<TerritorySeed>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreSection::default(),
            llm: LlmSection::default(),
            world: WorldSection::default(),
            agents: AgentsSection::default(),
            territories: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file, or defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable or malformed files.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&raw)?)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_port() -> u16 {
    8090
}

/// Persistent store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Database file path.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Pool size.
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_pool_size(),
        }
    }
}

fn default_db_path() -> String {
    "haven.db".to_owned()
}

const fn default_pool_size() -> u32 {
    10
}

/// Language-model backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// Which API shape to speak.
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,
    /// Base API URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-call deadline in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

const fn default_backend_kind() -> BackendKind {
    BackendKind::OpenAi
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_owned()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_owned()
}

fn default_model() -> String {
    "gpt-4o".to_owned()
}

const fn default_llm_timeout() -> u64 {
    30
}

/// World tick settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldSection {
    /// Simulated seconds per wall second.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Wall seconds between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: f64,
    /// Whether the tick loop starts with the process.
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            tick_interval_secs: default_tick_interval(),
            autostart: default_autostart(),
        }
    }
}

const fn default_time_scale() -> f64 {
    60.0
}

const fn default_tick_interval() -> f64 {
    60.0
}

const fn default_autostart() -> bool {
    true
}

/// Agent runtime tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
    /// Wall seconds between autonomous reflections.
    #[serde(default = "default_reflection_interval")]
    pub reflection_interval_secs: u64,
    /// Probability a rumor is authored after an interaction.
    #[serde(default = "default_rumor_probability")]
    pub rumor_probability: f64,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            reflection_interval_secs: default_reflection_interval(),
            rumor_probability: default_rumor_probability(),
        }
    }
}

const fn default_reflection_interval() -> u64 {
    300
}

const fn default_rumor_probability() -> f64 {
    0.3
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.store.max_connections, 10);
        assert_eq!(config.world.time_scale, 60.0);
        assert_eq!(config.agents.reflection_interval_secs, 300);
        assert!(config.territories.is_none());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: EngineConfig = serde_yml::from_str(
            r"
server:
  port: 9000
llm:
  kind: anthropic
  model: claude-sonnet-4-5
",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.kind, BackendKind::Anthropic);
        assert_eq!(config.llm.model, "claude-sonnet-4-5");
        assert_eq!(config.world.tick_interval_secs, 60.0);
    }

    #[test]
    fn territories_parse_from_yaml() {
        let config: EngineConfig = serde_yml::from_str(
            r"
territories:
  - name: The Mill
    faction: citizens
    control_strength: 0.7
    strategic_value: 0.5
",
        )
        .unwrap();
        let territories = config.territories.unwrap();
        assert_eq!(territories.len(), 1);
        assert_eq!(territories[0].name, "The Mill");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = EngineConfig::load("does-not-exist.yaml").unwrap();
        assert_eq!(config.server.port, 8090);
    }
}
