//! Runtime configuration, read from the environment (and `.env` via dotenvy in
//! the binary).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::session::{RegistryConfig, DEFAULT_STORAGE_KEY};
use crate::{CartError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub session_ttl: Duration,
    pub eviction_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            port: parse_or(&lookup, "PORT", 8083)?,
            storage_dir: lookup("CART_STORAGE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data/carts")),
            storage_key: lookup("CART_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
            session_ttl: Duration::from_secs(parse_or(&lookup, "CART_SESSION_TTL_SECS", 1800)?),
            eviction_interval: Duration::from_secs(parse_or::<u64>(&lookup, "CART_EVICTION_INTERVAL_SECS", 60)?.max(1)),
        })
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            storage_dir: self.storage_dir.clone(),
            storage_key: self.storage_key.clone(),
            ttl: self.session_ttl,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| CartError::Config(format!("invalid {key}: {raw:?}"))),
        None => Ok(default),
    }
}
