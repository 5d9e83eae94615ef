use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Where the migration backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Timer periods, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_auth_poll_ms")]
    pub auth_poll_ms: u64,
    #[serde(default = "default_alert_ttl_ms")]
    pub alert_ttl_ms: u64,
    #[serde(default = "default_flow_fallback_ms")]
    pub flow_fallback_ms: u64,
    #[serde(default = "default_flow_settle_ms")]
    pub flow_settle_ms: u64,
    #[serde(default = "default_migration_poll_ms")]
    pub migration_poll_ms: u64,
}

/// Local listener that receives `auth_complete` signals from the
/// authorization callback page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_notify_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Program and leading arguments used to open the authorization surface,
    /// e.g. `["chromium", "--app"]`.  The URL is appended as the last
    /// argument.  Falls back to the platform opener when unset.
    #[serde(default)]
    pub opener: Option<Vec<String>>,
}

impl TimingConfig {
    pub fn auth_poll(&self) -> Duration {
        Duration::from_millis(self.auth_poll_ms)
    }

    pub fn alert_ttl(&self) -> Duration {
        Duration::from_millis(self.alert_ttl_ms)
    }

    pub fn flow_fallback(&self) -> Duration {
        Duration::from_millis(self.flow_fallback_ms)
    }

    pub fn flow_settle(&self) -> Duration {
        Duration::from_millis(self.flow_settle_ms)
    }

    pub fn migration_poll(&self) -> Duration {
        Duration::from_millis(self.migration_poll_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute URL for a backend path such as `/auth/spotify`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            auth_poll_ms: default_auth_poll_ms(),
            alert_ttl_ms: default_alert_ttl_ms(),
            flow_fallback_ms: default_flow_fallback_ms(),
            flow_settle_ms: default_flow_settle_ms(),
            migration_poll_ms: default_migration_poll_ms(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            bind_address: default_bind_address(),
            port: default_notify_port(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_auth_poll_ms() -> u64 {
    5000
}

fn default_alert_ttl_ms() -> u64 {
    5000
}

fn default_flow_fallback_ms() -> u64 {
    1000
}

fn default_flow_settle_ms() -> u64 {
    1000
}

fn default_migration_poll_ms() -> u64 {
    1000
}

fn default_notify_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_notify_port() -> u16 {
    5057
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
