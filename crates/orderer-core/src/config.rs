//! Configuration system for the orderer.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ORDERER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/orderer/config.toml
//!   3. ~/.config/orderer/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdererConfig {
    pub general: GeneralConfig,
    pub network: NetworkConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Message count that cuts a block immediately.
    pub batch_size: u32,
    /// Milliseconds after which a non-empty batch is cut regardless of size.
    pub batch_timeout_ms: u64,
    /// Intake queue capacity. 0 = batch_size.
    pub intake_capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address both listeners bind to.
    pub listen_addr: String,
    /// TCP port for broadcast streams. 0 = OS-assigned.
    pub broadcast_port: u16,
    /// HTTP status API port.
    pub api_port: u16,
    /// Largest accepted request frame. Bigger frames end the stream.
    pub max_message_bytes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Append-only file per topic under `log_dir`.
    File,
    /// In-process only. Nothing survives the daemon.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub log_dir: PathBuf,
    /// One log per broadcaster; the file is `{log_dir}/{topic}.log`.
    pub topic: String,
    /// fsync after every block.
    pub sync_every_block: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout_ms: 1000,
            intake_capacity: 0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            broadcast_port: 7050,
            api_port: 7051,
            max_message_bytes: 1_048_576, // 1 MiB
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::File,
            log_dir: data_dir().join("log"),
            topic: "orderer".to_string(),
            sync_every_block: true,
        }
    }
}

impl GeneralConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Effective intake capacity.
    pub fn intake_capacity(&self) -> usize {
        if self.intake_capacity == 0 {
            self.batch_size as usize
        } else {
            self.intake_capacity as usize
        }
    }
}

impl SinkConfig {
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.log", self.topic))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("orderer")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("orderer")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl OrdererConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            OrdererConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ORDERER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&OrdererConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject values the broadcaster cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.batch_size == 0 {
            return Err(ConfigError::Invalid("general.batch_size must be positive"));
        }
        if self.general.batch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "general.batch_timeout_ms must be positive",
            ));
        }
        if self.network.max_message_bytes == 0 {
            return Err(ConfigError::Invalid(
                "network.max_message_bytes must be positive",
            ));
        }
        if self.sink.topic.is_empty() {
            return Err(ConfigError::Invalid("sink.topic must not be empty"));
        }
        Ok(())
    }

    /// Apply ORDERER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ORDERER_GENERAL__BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.general.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("ORDERER_GENERAL__BATCH_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.general.batch_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("ORDERER_NETWORK__BROADCAST_PORT") {
            if let Ok(p) = v.parse() {
                self.network.broadcast_port = p;
            }
        }
        if let Ok(v) = std::env::var("ORDERER_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("ORDERER_SINK__KIND") {
            match v.as_str() {
                "file" => self.sink.kind = SinkKind::File,
                "memory" => self.sink.kind = SinkKind::Memory,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("ORDERER_SINK__TOPIC") {
            self.sink.topic = v;
        }
    }
}
