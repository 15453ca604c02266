use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Built-in defaults, overridable by files and `PLANNR__*` environment variables.
const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub transport: TransportConfig,
    pub holds: HoldRules,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 { 15 }

#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    pub ws_url: String,
    pub topic_prefix: String,
    pub send_destination: String,
    pub join_destination: String,
    #[serde(default)]
    pub heartbeat_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl TransportConfig {
    /// Broker destination for a conversation's live feed.
    pub fn topic_for(&self, chat_id: &str) -> String {
        format!("{}{}", self.topic_prefix, chat_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldRules {
    pub hold_duration_seconds: u64,
    pub tick_interval_ms: u64,
}

impl HoldRules {
    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_duration_seconds as i64)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Publish over the transport and rely on the broker echo.
    Realtime,
    /// POST to the history service and append the response.
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub send_mode: SendMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub recent_activity_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub refresh_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `PLANNR__API__BASE_URL=https://api.plannr.ai`
            .add_source(config::Environment::with_prefix("PLANNR").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Defaults only, without touching the filesystem or environment.
    pub fn builtin() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
