//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `KEEL_CONFIG` env var (default `config/config.toml`)
//! 3. **Environment variables**: `KEEL__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP and WebSocket listeners
//! - [`StorageConfig`]: Database URL and chain id to partition mapping
//! - [`SyncConfig`]: Log synchronizer batch size and head polling
//! - [`LoggingConfig`]: Log level and format
//! - [`NetworkConfig`]: One entry per served network, with its contracts
//!
//! # Example
//!
//! ```toml
//! methods = ["eth_chainId", "eth_getLogs"]
//!
//! [server]
//! http_port = 8545
//!
//! [[networks]]
//! name = "mainnet"
//! upstream_url = "https://eth-mainnet.example.com"
//! subscription_url = "wss://eth-mainnet.example.com/ws"
//! allowed_addresses = ["0x6b175474e89094c44da98b954eedeac495271d0f"]
//!
//! [[networks.contracts]]
//! address = "0x6b175474e89094c44da98b954eedeac495271d0f"
//! genesis_block = 8928158
//! ```

use crate::{types::RpcMethod, utils::hex::normalize_hash};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    path::Path,
    time::Duration,
};

/// Errors raised while loading or validating configuration.
///
/// Every variant is fatal for the process or for the network it names.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("No networks configured")]
    NoNetworks,

    #[error("Duplicate network name: {0}")]
    DuplicateNetwork(String),

    #[error("Invalid upstream URL for network {network}: {url}")]
    InvalidUpstreamUrl { network: String, url: String },

    #[error("Missing genesis block for contract {address} on network {network}")]
    MissingGenesis { network: String, address: String },

    #[error("No storage partition mapped for chain id {0}")]
    UnmappedChainId(u64),

    #[error("Unsupported method in whitelist: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP and WebSocket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address both listeners bind to. Defaults to `0.0.0.0`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port of the JSON-RPC HTTP surface. Defaults to `8545`.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port of the JSON-RPC WebSocket surface. Defaults to `8546`.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Maximum number of in-flight HTTP requests. Defaults to `1000`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8545
}

fn default_ws_port() -> u16 {
    8546
}

fn default_max_concurrent_requests() -> usize {
    1000
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` URL, or `memory` for a process-local store. Defaults to
    /// `sqlite://./db/keel.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Decimal chain id to partition index. Each chain's keys live in their own partition.
    #[serde(default = "default_partitions")]
    pub partitions: HashMap<String, u32>,
}

fn default_database_url() -> String {
    "sqlite://./db/keel.db".to_string()
}

fn default_partitions() -> HashMap<String, u32> {
    [("1", 1), ("3", 2), ("4", 3), ("5", 4), ("42", 5)]
        .into_iter()
        .map(|(chain, partition)| (chain.to_string(), partition))
        .collect()
}

/// Log synchronizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of blocks fetched per `eth_getLogs` window. Defaults to `1000`.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Poll interval for `eth_blockNumber` on networks without a socket endpoint. Defaults to
    /// `4`.
    #[serde(default = "default_head_poll_interval_seconds")]
    pub head_poll_interval_seconds: u64,
}

fn default_batch_size() -> u64 {
    1000
}

fn default_head_poll_interval_seconds() -> u64 {
    4
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// A contract whose event logs are synchronized into the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: String,

    /// First block that can contain logs of the contract. Scans never go below it.
    #[serde(default)]
    pub genesis_block: Option<u64>,
}

/// One served network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Subdomain label clients use to reach the network (e.g. `mainnet` in
    /// `mainnet.rpc.example.com`).
    pub name: String,

    /// Upstream node endpoint, `http(s)://` or `ws(s)://`.
    pub upstream_url: String,

    /// Optional `ws(s)://` endpoint used for the `newHeads` subscription.
    #[serde(default)]
    pub subscription_url: Option<String>,

    /// Addresses clients may target with `eth_call`, `eth_estimateGas` and `eth_getLogs`,
    /// in addition to the configured contracts.
    #[serde(default)]
    pub allowed_addresses: Vec<String>,

    #[serde(default)]
    pub contracts: Vec<ContractConfig>,
}

impl NetworkConfig {
    /// Normalized address whitelist: `allowed_addresses` plus every contract address.
    #[must_use]
    pub fn address_whitelist(&self) -> HashSet<String> {
        self.allowed_addresses
            .iter()
            .chain(self.contracts.iter().map(|c| &c.address))
            .map(|a| normalize_hash(a))
            .collect()
    }

    /// Endpoint the head subscription should use, if any: the explicit subscription URL, or the
    /// upstream itself when it is a socket endpoint.
    #[must_use]
    pub fn head_socket_url(&self) -> Option<&str> {
        self.subscription_url.as_deref().or_else(|| {
            is_socket_url(&self.upstream_url).then_some(self.upstream_url.as_str())
        })
    }
}

fn is_socket_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "ws" | "wss"))
}

fn is_http_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Root application configuration containing all subsystem settings.
///
/// Loaded with the `KEEL` prefix for environment overrides using `__` as a separator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Whitelisted JSON-RPC methods, shared by every network.
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

fn default_methods() -> Vec<String> {
    RpcMethod::ALL.iter().map(|m| m.as_str().to_string()).collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_url: default_database_url(), partitions: default_partitions() }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            head_poll_interval_seconds: default_head_poll_interval_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
            methods: default_methods(),
            networks: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `KEEL__` prefix can override any configuration value.
    /// Use `__` as a separator for nested fields (e.g., `KEEL__SERVER__HTTP_PORT=9545`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", default_bind_address())?
            .set_default("server.http_port", default_http_port())?
            .set_default("server.ws_port", default_ws_port())?
            .set_default("server.max_concurrent_requests", 1000)?
            .set_default("storage.database_url", default_database_url())?
            .set_default("sync.batch_size", default_batch_size())?
            .set_default("sync.head_poll_interval_seconds", default_head_poll_interval_seconds())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("KEEL").separator("__"))
            .build()?;

        Ok(config_builder.try_deserialize()?)
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `KEEL_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("KEEL_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Socket address of the HTTP listener.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the bind address is not an IP address.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.socket_addr(self.server.http_port)
    }

    /// Socket address of the WebSocket listener.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the bind address is not an IP address.
    pub fn ws_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.socket_addr(self.server.ws_port)
    }

    fn socket_addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_address, port).parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid socket address: {}:{}",
                self.server.bind_address, port
            ))
        })
    }

    /// Returns the head polling interval as a [`Duration`].
    #[must_use]
    pub fn head_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.head_poll_interval_seconds)
    }

    /// Storage partition for a chain id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnmappedChainId`] if the chain id has no partition.
    pub fn partition_for(&self, chain_id: u64) -> Result<u32, ConfigError> {
        self.storage
            .partitions
            .get(&chain_id.to_string())
            .copied()
            .ok_or(ConfigError::UnmappedChainId(chain_id))
    }

    /// The method whitelist as typed methods.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedMethod`] for a name outside [`RpcMethod`].
    pub fn method_whitelist(&self) -> Result<HashSet<RpcMethod>, ConfigError> {
        self.methods
            .iter()
            .map(|name| name.parse().map_err(|_| ConfigError::UnsupportedMethod(name.clone())))
            .collect()
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }

        let mut names = HashSet::new();
        for network in &self.networks {
            if network.name.trim().is_empty() {
                return Err(ConfigError::Invalid("Network name must not be empty".to_string()));
            }
            if !names.insert(network.name.to_lowercase()) {
                return Err(ConfigError::DuplicateNetwork(network.name.clone()));
            }
            if !is_http_url(&network.upstream_url) && !is_socket_url(&network.upstream_url) {
                return Err(ConfigError::InvalidUpstreamUrl {
                    network: network.name.clone(),
                    url: network.upstream_url.clone(),
                });
            }
            if let Some(ref url) = network.subscription_url {
                if !is_socket_url(url) {
                    return Err(ConfigError::InvalidUpstreamUrl {
                        network: network.name.clone(),
                        url: url.clone(),
                    });
                }
            }
            if let Some(contract) = network.contracts.iter().find(|c| c.genesis_block.is_none())
            {
                return Err(ConfigError::MissingGenesis {
                    network: network.name.clone(),
                    address: contract.address.clone(),
                });
            }
        }

        if self.methods.is_empty() {
            return Err(ConfigError::Invalid("Method whitelist must not be empty".to_string()));
        }
        self.method_whitelist()?;

        if self.sync.batch_size == 0 {
            return Err(ConfigError::Invalid("Sync batch size must be greater than 0".to_string()));
        }

        if self.sync.head_poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Head poll interval must be greater than 0".to_string(),
            ));
        }

        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "Max concurrent requests must be greater than 0".to_string(),
            ));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid("Logging format must be 'json' or 'pretty'".to_string()));
        }

        Ok(())
    }
}
