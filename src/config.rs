//! Configuration for the govm mining client
//!
//! A small CLI (clap) selects a JSON or YAML configuration file and a few
//! one-shot actions; everything that shapes mining behavior lives in the
//! file, with defaults for every key.

use crate::{Error, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Command line interface
#[derive(Debug, Parser)]
#[command(
    name = "govm-mining-client",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-chain proof-of-work mining client for the govm network"
)]
pub struct Cli {
    /// Configuration file path (JSON or YAML)
    #[arg(long, value_name = "FILE", default_value = "conf.json")]
    pub config_file: PathBuf,

    /// Generate a new keypair, print it, and exit
    #[arg(long)]
    pub generate_key: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Override the configured verbosity (0-4)
    #[arg(short = 'v', long)]
    pub verbosity: Option<u32>,
}

/// Mining configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary wallet file; created with a fresh key if missing
    pub wallet_file: String,
    /// Accepted for compatibility with older config files; the JSON wallet
    /// format is not encrypted and ignores it
    pub password: String,
    /// Alternate signing identity used for every 4th block index;
    /// defaults to the primary wallet when unset
    pub secondary_wallet_file: Option<String>,
    /// Chain server addresses (host:port)
    pub servers: Vec<String>,
    /// Search threads per chain; 0 uses the number of CPUs
    pub thread_number: usize,
    /// Nonces per search batch; 0 uses the default of 256
    pub chunk_hashes: u64,
    /// Optional sleep between batches, for throttling
    pub chunk_sleep_msec: u64,
    /// Chains to mine
    pub chains: Vec<u64>,
    /// Persistent template connections per chain (capped at the server count)
    pub keep_conn_server_num: usize,
    /// Log detail level, 0 (errors only) through 4+ (trace)
    pub verbosity: u32,
    /// Re-seal every candidate through the single-shot path and compare
    pub verify_candidates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallet_file: "wallet.user.key".to_string(),
            password: String::new(),
            secondary_wallet_file: None,
            servers: Vec::new(),
            thread_number: 1,
            chunk_hashes: 0,
            chunk_sleep_msec: 0,
            chains: vec![1],
            keep_conn_server_num: 1,
            verbosity: 2,
            verify_candidates: true,
        }
    }
}

impl Config {
    /// Load and validate a configuration file (JSON or YAML by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config {}: {e}", path.display()))
        })?;

        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("server list is empty"));
        }
        if self.chains.is_empty() {
            return Err(Error::config("chain list is empty"));
        }
        if self.wallet_file.is_empty() {
            return Err(Error::config("wallet_file must be set"));
        }
        for server in &self.servers {
            // Servers are host:port pairs, no scheme or path.
            let url = Url::parse(&format!("ws://{server}/"))
                .map_err(|e| Error::config(format!("invalid server address {server}: {e}")))?;
            if url.port().is_none() || url.path() != "/" {
                return Err(Error::config(format!(
                    "server address must be host:port, got {server}"
                )));
            }
        }
        Ok(())
    }

    /// Search threads per chain.
    pub fn effective_threads(&self) -> usize {
        if self.thread_number == 0 {
            num_cpus::get()
        } else {
            self.thread_number
        }
    }

    /// Nonces per search batch.
    pub fn increment(&self) -> u64 {
        if self.chunk_hashes == 0 {
            256
        } else {
            self.chunk_hashes
        }
    }

    /// Per-batch throttle sleep; `None` when unthrottled.
    pub fn throttle(&self) -> Option<Duration> {
        if self.chunk_sleep_msec == 0 {
            None
        } else {
            Some(Duration::from_millis(self.chunk_sleep_msec))
        }
    }

    /// Connections to keep per chain.
    pub fn connections_per_chain(&self) -> usize {
        self.keep_conn_server_num.max(1).min(self.servers.len())
    }

    /// Default tracing filter directive for the configured verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.increment(), 256);
        assert_eq!(config.throttle(), None);
        assert_eq!(config.verbosity, 2);
        assert!(config.verify_candidates);
        assert!(config.effective_threads() >= 1);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{
            "wallet_file": "wallet.key",
            "servers": ["srv1:9090", "srv2:9090"],
            "thread_number": 4,
            "chunk_hashes": 512,
            "chunk_sleep_msec": 10,
            "chains": [1, 2],
            "keep_conn_server_num": 2,
            "verbosity": 3
        }"#;

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{json}").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.effective_threads(), 4);
        assert_eq!(config.increment(), 512);
        assert_eq!(config.throttle(), Some(Duration::from_millis(10)));
        assert_eq!(config.chains, vec![1, 2]);
        assert_eq!(config.connections_per_chain(), 2);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_load_yaml() {
        let yaml = "wallet_file: wallet.key\nservers:\n  - srv1:9090\nchains: [3]\n";
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{yaml}").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.servers, vec!["srv1:9090"]);
        assert_eq!(config.chains, vec![3]);
    }

    #[test]
    fn test_empty_server_list_rejected() {
        let config = Config {
            servers: Vec::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_address_must_be_host_port() {
        let config = Config {
            servers: vec!["srv1:9090/api".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            servers: vec!["srv1".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connections_capped_at_server_count() {
        let config = Config {
            servers: vec!["a:1".into(), "b:1".into()],
            keep_conn_server_num: 5,
            ..Config::default()
        };
        assert_eq!(config.connections_per_chain(), 2);

        let config = Config {
            servers: vec!["a:1".into()],
            keep_conn_server_num: 0,
            ..Config::default()
        };
        assert_eq!(config.connections_per_chain(), 1);
    }

    #[test]
    fn test_verbosity_filter_mapping() {
        let mut config = Config::default();
        config.verbosity = 0;
        assert_eq!(config.log_filter(), "error");
        config.verbosity = 4;
        assert_eq!(config.log_filter(), "trace");
        config.verbosity = 9;
        assert_eq!(config.log_filter(), "trace");
    }
}
