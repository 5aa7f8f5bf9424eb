use anyhow::{Context, bail};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::{detector::AbsentPolicy, relay::file::FileFormat};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

const CURRENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            poll: PollConfig::default(),
            source: SourceConfig::default(),
            database: Database::default(),
            relay: RelayConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// rejects settings that would spin or break the sockets
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != CURRENT_VERSION {
            bail!(
                "Unsupported config version {}, expected {CURRENT_VERSION}",
                self.version
            );
        }
        if self.poll.interval_ms == 0 {
            bail!("poll.interval_ms must be greater than 0");
        }
        if self.relay.websocket.timeout_ms == 0 {
            bail!("relay.websocket.timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub initial_delay_ms: u64,
    pub absent_policy: AbsentPolicy,
    /// start from the last stored track instead of reporting the current one again
    pub restore_state: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            initial_delay_ms: 1000,
            absent_policy: AbsentPolicy::Keep,
            restore_state: false,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// Where the current media metadata comes from
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// pushed by the page to `POST /metadata`
    #[default]
    Http,
    /// a json file rewritten by some helper
    File { path: PathBuf },
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Database {
    #[default]
    InMemory,
    OnDisk {
        path: PathBuf,
    },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub history_limit: usize,
    /// `source` field of outgoing websocket messages
    pub source_tag: String,
    /// `source` field of test messages, which consumers tell apart from live ones
    pub test_source_tag: String,
    pub websocket: WebSocketConfig,
    pub file: FileConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            source_tag: "amp-now-playing-getter-firefox-extension".to_string(),
            test_source_tag: "firefox-extension".to_string(),
            websocket: WebSocketConfig::default(),
            file: FileConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebSocketConfig {
    pub url: String,
    pub auto_connect: bool,
    /// limit for connecting, the handshake and each send
    pub timeout_ms: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            auto_connect: false,
            timeout_ms: 5000,
        }
    }
}

impl WebSocketConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FileConfig {
    pub auto_save: bool,
    pub path: Option<PathBuf>,
    pub format: FileFormat,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}
