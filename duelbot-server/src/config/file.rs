//! TOML file configuration structures.
//!
//! These structs directly map to the `duelbot-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub duel: DuelSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Chat relay connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HMAC key shared with the relay, used in both directions.
    pub secret: String,
    /// Where outgoing messages and whispers are POSTed.
    pub outbound_url: url::Url,
}

/// Duel timing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelSection {
    #[serde(default = "default_ttl_secs")]
    pub open_ttl_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub awaiting_moves_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub max_wager: Option<i64>,
}

impl Default for DuelSection {
    fn default() -> Self {
        Self {
            open_ttl_secs: default_ttl_secs(),
            awaiting_moves_ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_wager: None,
        }
    }
}

fn default_ttl_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    10
}
