//! Configuration management for the fee-payer relay
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub relay: RelayConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub payer: PayerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_lookahead_blocks")]
    pub base_fee_lookahead_blocks: u32,
    #[serde(default)]
    pub fee_policy: FeePolicy,
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            base_fee_lookahead_blocks: default_lookahead_blocks(),
            fee_policy: FeePolicy::default(),
            reply_timeout_secs: default_reply_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// How the fee estimator prices an envelope
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Worst-case base fee after the lookahead window
    #[default]
    Lookahead,
    /// Base fee of the latest block, unadjusted
    CurrentBaseFee,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub rpc_urls: Vec<String>,
    pub evm_denom: String,
    pub bech32_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayerConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for PayerConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_queue_capacity() -> usize {
    1 << 14
}

fn default_lookahead_blocks() -> u32 {
    2
}

fn default_reply_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_private_key_env() -> String {
    "FEE_PAYER_PRIVATE_KEY".to_string()
}

impl Settings {
    /// Load settings from the file named by `FEEPAYER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("FEEPAYER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse and validate a TOML document
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.relay.queue_capacity == 0 {
            anyhow::bail!("relay.queue_capacity must be greater than zero");
        }
        if self.relay.base_fee_lookahead_blocks == 0 {
            anyhow::bail!("relay.base_fee_lookahead_blocks must be at least 1");
        }
        if self.chain.rpc_urls.is_empty() {
            anyhow::bail!("Chain {} has no RPC URLs configured", self.chain.chain_id);
        }
        if self.chain.chain_id.is_empty() {
            anyhow::bail!("chain.chain_id must not be empty");
        }
        if self.chain.evm_denom.is_empty() {
            anyhow::bail!("chain.evm_denom must not be empty");
        }
        if self.chain.bech32_prefix.is_empty() {
            anyhow::bail!("chain.bech32_prefix must not be empty");
        }

        Ok(())
    }
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR.replace_all(input, |cap: &Captures| {
        env::var(&cap[1]).unwrap_or_default()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[chain]
chain_id = "evmos_9000-1"
rpc_urls = ["http://127.0.0.1:26657"]
evm_denom = "aevmos"
bech32_prefix = "evmos"

[api]
host = "0.0.0.0"
port = 8080

[metrics]
enabled = false
port = 9090
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("FEEPAYER_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${FEEPAYER_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.relay.queue_capacity, 16384);
        assert_eq!(settings.relay.base_fee_lookahead_blocks, 2);
        assert_eq!(settings.relay.fee_policy, FeePolicy::Lookahead);
        assert_eq!(settings.relay.reply_timeout_secs, 30);
        assert_eq!(settings.relay.shutdown_grace_secs, 10);
        assert_eq!(settings.payer.private_key_env, "FEE_PAYER_PRIVATE_KEY");
    }

    #[test]
    fn test_fee_policy_parsed() {
        let doc = format!(
            "[relay]\nfee_policy = \"current_base_fee\"\nbase_fee_lookahead_blocks = 3\n{}",
            MINIMAL
        );
        let settings = Settings::parse(&doc).unwrap();
        assert_eq!(settings.relay.fee_policy, FeePolicy::CurrentBaseFee);
        assert_eq!(settings.relay.base_fee_lookahead_blocks, 3);
    }

    #[test]
    fn test_validation_rejects_zero_lookahead() {
        let doc = format!("[relay]\nbase_fee_lookahead_blocks = 0\n{}", MINIMAL);
        assert!(Settings::parse(&doc).is_err());
    }

    #[test]
    fn test_validation_rejects_missing_rpc() {
        let doc = MINIMAL.replace("[\"http://127.0.0.1:26657\"]", "[]");
        assert!(Settings::parse(&doc).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.chain.chain_id, "evmos_9000-1");
        assert_eq!(settings.chain.rpc_urls.len(), 1);
    }
}
