//! Configuration loading for wirefly peers.
//!
//! Configuration is read from an optional TOML file. Every section and
//! every field may be left out.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wirefly_core::{TickConfig, BUMP_FACTOR, SUBTICKS_PER_CYCLE, SUBTICK_DURATION};

use crate::display::{OverflowPolicy, DISPLAY_CAPACITY};
use crate::node::{NodeOptions, DEFAULT_TOPIC};
use crate::relay::INBOUND_CAPACITY;
use crate::transport::{UdpConfig, DEFAULT_PEER_TTL};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Topic and UDP settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Oscillator tunables.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Stream sizes.
    #[serde(default)]
    pub buffers: BuffersConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Topic to join (default: tick-primary).
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Display name (default: derived from $USER and the peer id).
    pub peer_name: Option<String>,
    /// UDP bind address (default: 0.0.0.0:4747).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Bootstrap peer addresses.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Seconds a silent peer stays listed (default: 10).
    #[serde(default = "default_peer_ttl_secs")]
    pub peer_ttl_secs: u64,
}

/// Oscillator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Subticks per cycle (default: 250).
    #[serde(default = "default_subticks_per_cycle")]
    pub subticks_per_cycle: u32,
    /// Milliseconds per subtick (default: 10).
    #[serde(default = "default_subtick_ms")]
    pub subtick_ms: u64,
    /// Coupling strength (default: 0.08).
    #[serde(default = "default_bump_factor")]
    pub bump_factor: f64,
}

/// Buffer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BuffersConfig {
    /// Inbound stream capacity (default: 128).
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// Display stream capacity (default: 128).
    #[serde(default = "default_display_capacity")]
    pub display_capacity: usize,
    /// `"block"` or `"drop-oldest"` (default: block).
    #[serde(default)]
    pub display_overflow: OverflowPolicy,
}

// Default value functions
fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_listen() -> String {
    UdpConfig::default().listen.to_string()
}

fn default_peer_ttl_secs() -> u64 {
    DEFAULT_PEER_TTL.as_secs()
}

fn default_subticks_per_cycle() -> u32 {
    SUBTICKS_PER_CYCLE
}

fn default_subtick_ms() -> u64 {
    SUBTICK_DURATION.as_millis() as u64
}

fn default_bump_factor() -> f64 {
    BUMP_FACTOR
}

fn default_inbound_capacity() -> usize {
    INBOUND_CAPACITY
}

fn default_display_capacity() -> usize {
    DISPLAY_CAPACITY
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            peer_name: None,
            listen: default_listen(),
            peers: Vec::new(),
            peer_ttl_secs: default_peer_ttl_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subticks_per_cycle: default_subticks_per_cycle(),
            subtick_ms: default_subtick_ms(),
            bump_factor: default_bump_factor(),
        }
    }
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            display_capacity: default_display_capacity(),
            display_overflow: OverflowPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check values that parse but cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.topic.is_empty() {
            return Err(ConfigError::Invalid("network.topic must not be empty".into()));
        }
        if self.buffers.inbound_capacity == 0 {
            return Err(ConfigError::Invalid("buffers.inbound_capacity must be at least 1".into()));
        }
        if self.buffers.display_capacity == 0 {
            return Err(ConfigError::Invalid("buffers.display_capacity must be at least 1".into()));
        }
        self.tick_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("engine: {}", e)))?;
        self.udp_config()?;
        Ok(())
    }

    /// Oscillator tunables.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            subticks_per_cycle: self.engine.subticks_per_cycle,
            subtick_duration: Duration::from_millis(self.engine.subtick_ms),
            bump_factor: self.engine.bump_factor,
        }
    }

    /// UDP transport settings with addresses parsed.
    pub fn udp_config(&self) -> Result<UdpConfig, ConfigError> {
        let listen = parse_addr("network.listen", &self.network.listen)?;
        let peers = self
            .network
            .peers
            .iter()
            .map(|peer| parse_addr("network.peers", peer))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UdpConfig {
            listen,
            peers,
            peer_ttl: Duration::from_secs(self.network.peer_ttl_secs),
        })
    }

    /// Node options for `peer_name`.
    pub fn node_options(&self, peer_name: impl Into<String>) -> NodeOptions {
        NodeOptions {
            tick: self.tick_config(),
            inbound_capacity: self.buffers.inbound_capacity,
            display_capacity: self.buffers.display_capacity,
            display_overflow: self.buffers.display_overflow,
            ..NodeOptions::new(self.network.topic.as_str(), peer_name)
        }
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", field, value, e)))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
