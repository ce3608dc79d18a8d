//! Configuration for hedgerpc components

use crate::client::StrategyKind;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `HEDGERPC__REPLICA__PORT=9000`
pub const ENV_PREFIX: &str = "HEDGERPC";

/// Shared key the replicas sign their answers with
pub const DEFAULT_HASH_KEY: &str = "Контур.Шпора";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Cluster client (driver) config
    #[serde(default)]
    pub client: ClientConfig,

    /// Replica server config
    #[serde(default)]
    pub replica: ReplicaConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            client: ClientConfig::default(),
            replica: ReplicaConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then from `HEDGERPC__*` env vars.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings: Settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        settings.replica.validate()?;
        Ok(settings)
    }
}

/// How a replica processes inbound calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Task per request, participates in the cancellation protocol
    #[default]
    Async,
    /// One request at a time on a blocking worker, always answers
    Sync,
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerMode::Async => write!(f, "async"),
            ServerMode::Sync => write!(f, "sync"),
        }
    }
}

/// Replica server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Address to bind the listener on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Listening port (0 picks an ephemeral port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path segment the query method is served under
    #[serde(default = "default_method_name")]
    pub method_name: String,

    /// Simulated processing time per request
    #[serde(default = "default_method_duration")]
    pub method_duration_ms: u64,

    #[serde(default)]
    pub mode: ServerMode,

    /// Shared HMAC key for response digests
    #[serde(default = "default_hash_key")]
    pub hash_key: String,

    /// How long cancels for unseen ids (and finished ids) are remembered
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_ms: u64,
}

fn default_bind_addr() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}
fn default_port() -> u16 {
    8080
}
fn default_method_name() -> String {
    "some_method".to_string()
}
fn default_method_duration() -> u64 {
    1000
}
fn default_hash_key() -> String {
    DEFAULT_HASH_KEY.to_string()
}
fn default_cancel_grace() -> u64 {
    30_000
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            method_name: default_method_name(),
            method_duration_ms: default_method_duration(),
            mode: ServerMode::default(),
            hash_key: default_hash_key(),
            cancel_grace_ms: default_cancel_grace(),
        }
    }
}

impl ReplicaConfig {
    pub fn method_duration(&self) -> Duration {
        Duration::from_millis(self.method_duration_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// Route the query method is mounted on, e.g. `/some_method/`
    pub fn method_path(&self) -> String {
        format!("/{}/", self.method_name)
    }

    /// URI clients should put in their replica list
    pub fn listen_uri(&self) -> String {
        format!(
            "http://{}:{}/{}/",
            self.bind_addr, self.port, self.method_name
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.method_name.is_empty() {
            return Err(Error::InvalidConfig("method name cannot be empty".into()));
        }
        if self.method_name.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "method name must be a single path segment: {}",
                self.method_name
            )));
        }
        Ok(())
    }
}

/// Cluster client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// File with one replica URI per line
    #[serde(default)]
    pub replicas_file: Option<PathBuf>,

    /// Replica URIs given inline (appended after the file's)
    #[serde(default)]
    pub replicas: Vec<String>,

    #[serde(default)]
    pub strategy: StrategyKind,

    /// Overall per-query deadline
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Max replicas contacted by the bounded-fanout strategy
    #[serde(default = "default_fanout_cap")]
    pub fanout_cap: usize,

    /// Delay between staggered launches of the bounded-fanout strategy
    #[serde(default = "default_fanout_pacing")]
    pub fanout_pacing_ms: u64,

    /// Budget for fire-and-forget cancel calls
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_ms: u64,
}

fn default_timeout() -> u64 {
    6000
}
fn default_fanout_cap() -> usize {
    10
}
fn default_fanout_pacing() -> u64 {
    20
}
fn default_cancel_timeout() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replicas_file: None,
            replicas: Vec::new(),
            strategy: StrategyKind::default(),
            timeout_ms: default_timeout(),
            fanout_cap: default_fanout_cap(),
            fanout_pacing_ms: default_fanout_pacing(),
            cancel_timeout_ms: default_cancel_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn fanout_pacing(&self) -> Duration {
        Duration::from_millis(self.fanout_pacing_ms)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }
}
