use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "PROFILE";

const DEFAULT_SECONDARY_ROOT: &str = "https://www.linkedin.com/voyager/api/identity";
const DEFAULT_DB_PATH: &str = "data/profiles.sqlite";

/// Runtime settings: built-in defaults overlaid by `PROFILE_*` environment
/// variables (`PROFILE_ATTEMPT_LIMIT=5`, `PROFILE_COOKIE=...`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub attempt_limit: u32,
    pub debounce_ms: u64,
    pub initial_delay_ms: u64,
    pub reparse_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub viewport_height: f32,
    pub secondary_enabled: bool,
    pub secondary_root: String,
    pub cookie: Option<String>,
    pub collaborator_url: Option<String>,
    pub database_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            attempt_limit: crate::session::DEFAULT_ATTEMPT_LIMIT,
            debounce_ms: 5000,
            initial_delay_ms: 2000,
            reparse_delay_ms: 500,
            poll_interval_ms: 1000,
            viewport_height: crate::parser::document::DEFAULT_VIEWPORT_HEIGHT,
            secondary_enabled: true,
            secondary_root: DEFAULT_SECONDARY_ROOT.to_string(),
            cookie: None,
            collaborator_url: None,
            database_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let d = Settings::default();
        Config::builder()
            .set_default("attempt_limit", d.attempt_limit as i64)?
            .set_default("debounce_ms", d.debounce_ms as i64)?
            .set_default("initial_delay_ms", d.initial_delay_ms as i64)?
            .set_default("reparse_delay_ms", d.reparse_delay_ms as i64)?
            .set_default("poll_interval_ms", d.poll_interval_ms as i64)?
            .set_default("viewport_height", d.viewport_height as f64)?
            .set_default("secondary_enabled", d.secondary_enabled)?
            .set_default("secondary_root", d.secondary_root)?
            .set_default("database_path", d.database_path)?
            .add_source(env)
            .build()?
            .try_deserialize()
            .context("Invalid PROFILE_* settings")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn reparse_delay(&self) -> Duration {
        Duration::from_millis(self.reparse_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
