use alloy_primitives::U256;
use serde::Deserialize;
use std::{io, net::Ipv4Addr, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
    /// Relay URLs with the expected public key in the username position.
    pub relays: Vec<String>,
    /// Passive monitors that receive a copy of every registration fan-out.
    pub relay_monitors: Vec<String>,
    /// When false, the status endpoint reports healthy without probing relays.
    pub relay_check: bool,
    /// Minimum acceptable bid value in wei. Zero-valued bids are rejected
    /// regardless.
    #[serde(with = "serde_utils::quoted_u256")]
    pub min_bid: U256,
    pub genesis_fork_version: String,
    pub timeout_get_header_ms: u64,
    pub timeout_get_payload_ms: u64,
    pub timeout_register_validator_ms: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 18550,
            relays: vec![],
            relay_monitors: vec![],
            relay_check: false,
            min_bid: U256::ZERO,
            genesis_fork_version: "0x00000000".to_string(),
            timeout_get_header_ms: 950,
            timeout_get_payload_ms: 4000,
            timeout_register_validator_ms: 3000,
            max_retries: 5,
        }
    }
}

pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config_data = std::fs::read_to_string(path.as_ref())?;
    toml::from_str(&config_data).map_err(From::from)
}
