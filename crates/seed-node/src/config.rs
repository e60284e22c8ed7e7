//! # Seed Configuration
//!
//! TOML configuration for the `tinyseed` binary.
//!
//! ## Resolution Order
//!
//! 1. Built-in defaults
//! 2. `<home>/config/config.toml`, when present
//! 3. Environment overrides: `ID` (chain id), `SEEDS`, `LISTENADDRESS`
//!
//! Relative file paths are resolved against the home directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use seed_discovery::{
    AddressBookConfig, ConnectionSlotsConfig, PexConfig, SeedAddress, SwitchConfig,
};

/// Directory under the user's home used when `TINYSEED_HOME` is unset.
pub const DEFAULT_HOME_DIR: &str = ".tinyseed";

/// Config file location relative to the home directory.
pub const CONFIG_FILE: &str = "config/config.toml";

/// Terra mainnet public seeds.
pub const DEFAULT_SEEDS: &str = "e999fc20aa5b87c1acef8677cf495ad85061cfb9@seed.terra.delightlabs.io:26656,\
6d8e943c049a80c161a889cb5fcf3d184215023e@public-seed2.terra.dev:26656,\
87048bf71526fb92d73733ba3ddb79b7a83ca11e@public-seed.terra.dev:26656";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither TINYSEED_HOME nor HOME is set.
    #[error("cannot determine home directory: set TINYSEED_HOME or HOME")]
    HomeNotFound,

    /// Config file exists but cannot be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`SeedConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `laddr` is not `[tcp://]ip:port`.
    #[error("invalid listen address: {0}")]
    InvalidListenAddress(String),

    /// `chain_id` is empty.
    #[error("chain_id must not be empty")]
    EmptyChainId,

    /// A peer cap of zero in both directions leaves nothing to do.
    #[error("max_num_inbound_peers and max_num_outbound_peers are both zero")]
    NoPeerSlots,
}

/// Seed node configuration, as stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Address to listen for incoming connections
    pub laddr: String,
    /// Network identifier; peers on other networks are rejected
    pub chain_id: String,
    /// Node key path (relative to home or absolute)
    pub node_key_file: PathBuf,
    /// Address book path (relative to home or absolute)
    pub addr_book_file: PathBuf,
    /// Strict routability rules; set false for private or local networks
    pub addr_book_strict: bool,
    /// Maximum number of inbound connections
    pub max_num_inbound_peers: usize,
    /// Maximum number of outbound connections
    pub max_num_outbound_peers: usize,
    /// Comma-separated bootstrap seeds, `id@host:port`
    pub seeds: String,
    /// Seconds a connection may live before it is churned
    pub churn_grace_period_secs: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            laddr: "tcp://0.0.0.0:36656".to_string(),
            chain_id: "columbus-5".to_string(),
            node_key_file: PathBuf::from("config/node_key.json"),
            addr_book_file: PathBuf::from("data/addrbook.json"),
            addr_book_strict: true,
            max_num_inbound_peers: 1000,
            max_num_outbound_peers: 1000,
            seeds: DEFAULT_SEEDS.to_string(),
            churn_grace_period_secs: 30,
        }
    }
}

/// Resolve the home directory from `TINYSEED_HOME`, falling back to
/// `$HOME/.tinyseed`.
pub fn home_dir(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(home) = lookup("TINYSEED_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    lookup("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| Path::new(&home).join(DEFAULT_HOME_DIR))
        .ok_or(ConfigError::HomeNotFound)
}

/// Process environment lookup for [`home_dir`] and [`SeedConfig::load`].
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl SeedConfig {
    /// Load the configuration for `home`: defaults, then the config file
    /// if it exists, then environment overrides. Paths come back absolute
    /// (relative to `home`) and the result is validated.
    pub fn load(home: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(lookup);
        config.resolve_paths(home);
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ID`, `SEEDS` and `LISTENADDRESS`. Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(chain_id) = non_empty("ID") {
            self.chain_id = chain_id;
        }
        if let Some(seeds) = non_empty("SEEDS") {
            self.seeds = seeds;
        }
        if let Some(laddr) = non_empty("LISTENADDRESS") {
            self.laddr = laddr;
        }
    }

    /// Make relative file paths relative to `home`.
    pub fn resolve_paths(&mut self, home: &Path) {
        if self.node_key_file.is_relative() {
            self.node_key_file = home.join(&self.node_key_file);
        }
        if self.addr_book_file.is_relative() {
            self.addr_book_file = home.join(&self.addr_book_file);
        }
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        if self.max_num_inbound_peers == 0 && self.max_num_outbound_peers == 0 {
            return Err(ConfigError::NoPeerSlots);
        }
        self.listen_addr()?;
        Ok(())
    }

    /// The listen address as a socket address; the `tcp://` scheme is optional.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.laddr.trim();
        raw.strip_prefix("tcp://")
            .unwrap_or(raw)
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.laddr.clone()))
    }

    /// Bootstrap seeds. Malformed items are logged and skipped.
    pub fn seed_addresses(&self) -> Vec<SeedAddress> {
        let (seeds, errors) = SeedAddress::parse_list(&self.seeds);
        for error in errors {
            warn!(%error, "Skipping invalid seed");
        }
        seeds
    }

    /// Address book settings: file, routability rules, default tables.
    pub fn address_book_config(&self) -> AddressBookConfig {
        AddressBookConfig {
            file_path: Some(self.addr_book_file.clone()),
            strict_routing: self.addr_book_strict,
            ..AddressBookConfig::default()
        }
    }

    /// Seed-mode PEX with the configured churn grace period.
    pub fn pex_config(&self) -> PexConfig {
        PexConfig {
            seed_mode: true,
            churn_grace_period: Duration::from_secs(self.churn_grace_period_secs),
            ..PexConfig::default()
        }
    }

    /// Switch settings: listen address and caps. Duplicate IPs are allowed
    /// since many nodes sit behind shared NATs.
    pub fn switch_config(&self) -> Result<SwitchConfig, ConfigError> {
        Ok(SwitchConfig {
            listen_addr: self.listen_addr()?,
            slots: ConnectionSlotsConfig {
                max_inbound: self.max_num_inbound_peers,
                max_outbound: self.max_num_outbound_peers,
                allow_duplicate_ip: true,
            },
            ..SwitchConfig::default()
        })
    }

    /// Moniker announced in the handshake.
    pub fn moniker(&self) -> String {
        format!("{}-seed", self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SeedConfig::default();
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:36656".parse().unwrap());
        assert_eq!(config.chain_id, "columbus-5");
        assert!(config.addr_book_strict);
        assert_eq!(config.seed_addresses().len(), 3);
        assert_eq!(config.moniker(), "columbus-5-seed");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_home_dir_prefers_tinyseed_home() {
        let home = home_dir(env(&[("TINYSEED_HOME", "/srv/seed"), ("HOME", "/home/u")])).unwrap();
        assert_eq!(home, PathBuf::from("/srv/seed"));

        let home = home_dir(env(&[("HOME", "/home/u")])).unwrap();
        assert_eq!(home, PathBuf::from("/home/u/.tinyseed"));

        assert!(matches!(home_dir(env(&[])), Err(ConfigError::HomeNotFound)));
    }

    #[test]
    fn test_load_without_file_uses_defaults_under_home() {
        let dir = tempfile::tempdir().unwrap();
        let config = SeedConfig::load(dir.path(), env(&[])).unwrap();

        assert_eq!(config.node_key_file, dir.path().join("config/node_key.json"));
        assert_eq!(config.addr_book_file, dir.path().join("data/addrbook.json"));
        assert_eq!(config.max_num_inbound_peers, 1000);
    }

    #[test]
    fn test_load_reads_file_and_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
chain_id = "testnet-1"
addr_book_strict = false
addr_book_file = "/var/lib/tinyseed/book.json"
max_num_outbound_peers = 10
"#,
        )
        .unwrap();

        let config = SeedConfig::load(dir.path(), env(&[])).unwrap();
        assert_eq!(config.chain_id, "testnet-1");
        assert!(!config.addr_book_strict);
        assert_eq!(config.addr_book_file, PathBuf::from("/var/lib/tinyseed/book.json"));
        assert_eq!(config.max_num_outbound_peers, 10);
        // Untouched keys keep their defaults
        assert_eq!(config.laddr, "tcp://0.0.0.0:36656");
        assert_eq!(config.switch_config().unwrap().slots.max_outbound, 10);
        assert!(!config.address_book_config().strict_routing);
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let seed = "0101010101010101010101010101010101010101@seed.example.org:26656";
        let config = SeedConfig::load(
            dir.path(),
            env(&[("ID", "phoenix-1"), ("SEEDS", seed), ("LISTENADDRESS", "tcp://127.0.0.1:4000")]),
        )
        .unwrap();

        assert_eq!(config.chain_id, "phoenix-1");
        assert_eq!(config.seed_addresses().len(), 1);
        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = SeedConfig::default();
        config.apply_env_overrides(env(&[("ID", ""), ("SEEDS", "  ")]));
        assert_eq!(config, SeedConfig::default());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = SeedConfig {
            laddr: "tcp://not-an-address".to_string(),
            ..SeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidListenAddress(_))));

        let config = SeedConfig {
            chain_id: String::new(),
            ..SeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyChainId)));

        let config = SeedConfig {
            max_num_inbound_peers: 0,
            max_num_outbound_peers: 0,
            ..SeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoPeerSlots)));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_num_inbound_peers = \"many\"").unwrap();

        assert!(matches!(
            SeedConfig::load(dir.path(), env(&[])),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_seeds_are_skipped() {
        let config = SeedConfig {
            seeds: "garbage, ,0101010101010101010101010101010101010101@10.0.0.1:26656".to_string(),
            ..SeedConfig::default()
        };
        assert_eq!(config.seed_addresses().len(), 1);
    }
}
