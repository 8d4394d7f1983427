use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub bot: BotSettings,
    pub gateway: Gateway,
    pub storage: Storage,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub sweep: Sweep,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct BotSettings {
    pub token: String,
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Gateway {
    pub backend: String, // "telegram" or "fake"
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "sqlite" or "memory"
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Verification {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub lang_timeout_secs: u64,
    #[serde(default = "default_failure_action")]
    pub failure_action: String, // "reject" or "pending"
}

#[derive(Debug, Deserialize)]
pub struct Sweep {
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_db_path() -> String {
    "turnstile.db".to_owned()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_failure_action() -> String {
    "reject".to_owned()
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_retention_days() -> u64 {
    7
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Default for Verification {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            verify_timeout_secs: default_timeout_secs(),
            lang_timeout_secs: default_timeout_secs(),
            failure_action: default_failure_action(),
        }
    }
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load settings from the toml file, letting `TURNSTILE__*` environment
/// variables override any key (e.g. `TURNSTILE__BOT__TOKEN`), so credentials
/// never have to live on disk.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("TURNSTILE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
