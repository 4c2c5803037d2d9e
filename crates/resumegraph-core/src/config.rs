//! Configuration management for resumegraph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (RESUMEGRAPH__ prefix, `__` separated)
//! 2. Config file (resumegraph.toml, or the prefix passed on the command line)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RESUMEGRAPH";

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Graph store endpoint, credentials, and pool sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Pool size, and the cap on concurrently open transactions.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Pipeline timeouts and query shaping.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound for any single stage.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Default overall timeout for one pipeline run, when the caller gives none.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Maximum rows returned by list-style queries.
    #[serde(default = "default_row_limit")]
    pub row_limit: u32,

    /// Skills added to the built-in query vocabulary.
    #[serde(default)]
    pub extra_skills: Vec<String>,
}

impl PipelineSettings {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Settings {
    /// Load settings from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        tracing::debug!(
            uri = %settings.neo4j.uri,
            max_connections = settings.neo4j.max_connections,
            stage_timeout_secs = settings.pipeline.stage_timeout_secs,
            "Settings loaded"
        );
        Ok(settings)
    }
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "resumegraph-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_stage_timeout() -> u64 {
    30
}

fn default_run_timeout() -> u64 {
    120
}

fn default_row_limit() -> u32 {
    500
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            run_timeout_secs: default_run_timeout(),
            row_limit: default_row_limit(),
            extra_skills: Vec::new(),
        }
    }
}
