//! Faucet configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ckb_faucet_core::address::Network;
use ckb_faucet_core::constants::{MIN_CELL_CAPACITY, MIN_FEE_RATE, SHANNONS_PER_CKB};
use ckb_faucet_core::crypto::{PrivateKey, validate_private_key};

#[derive(Clone)]
pub struct Config {
    /// CKB node JSON-RPC endpoint.
    pub node_url: String,
    /// Faucet wallet key.
    pub private_key: PrivateKey,
    /// Amount to dispense per request, in shannons.
    pub amount_shannons: u64,
    /// Smallest fee paid per payout transaction, in shannons.
    pub fee_shannons: u64,
    /// Fee charged per 1000 bytes of transaction, in shannons.
    pub fee_rate: u64,
    /// Cooldown between payouts per identity, in seconds.
    pub cooldown_secs: u64,
    /// Address to bind the HTTP server.
    pub bind_addr: String,
    /// JSON-lines audit log of payouts.
    pub records_path: PathBuf,
    /// Network the faucet pays on; addresses of the other network are refused.
    pub network: Network,
    /// GitHub API base used to resolve access tokens.
    pub github_api_url: String,
    /// Timeout applied to node and GitHub requests.
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, validating every value once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let node_url = lookup("FAUCET_NODE_URL").unwrap_or_else(|| "http://127.0.0.1:8114".to_string());

        let private_key = lookup("FAUCET_PRIVATE_KEY").context("FAUCET_PRIVATE_KEY is required")?;
        let private_key = validate_private_key(private_key.trim())
            .context("FAUCET_PRIVATE_KEY must be 64 hex characters (optionally 0x-prefixed)")?;

        let amount_ckb: u64 = lookup("FAUCET_AMOUNT_CKB")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .context("FAUCET_AMOUNT_CKB must be a positive integer")?;

        let amount_shannons = amount_ckb
            .checked_mul(SHANNONS_PER_CKB)
            .context("FAUCET_AMOUNT_CKB overflow")?;
        if amount_shannons < MIN_CELL_CAPACITY {
            bail!(
                "FAUCET_AMOUNT_CKB must be at least {} CKB",
                MIN_CELL_CAPACITY / SHANNONS_PER_CKB
            );
        }

        let fee_shannons: u64 = lookup("FAUCET_TX_FEE_SHANNONS")
            .unwrap_or_else(|| "1000".to_string())
            .parse()
            .context("FAUCET_TX_FEE_SHANNONS must be a non-negative integer")?;

        let fee_rate: u64 = lookup("FAUCET_FEE_RATE")
            .unwrap_or_else(|| MIN_FEE_RATE.to_string())
            .parse()
            .context("FAUCET_FEE_RATE must be a non-negative integer")?;
        if fee_rate < MIN_FEE_RATE {
            bail!("FAUCET_FEE_RATE must be at least {MIN_FEE_RATE} shannons per KB");
        }

        let cooldown_secs: u64 = lookup("FAUCET_COOLDOWN_SECS")
            .unwrap_or_else(|| "86400".to_string())
            .parse()
            .context("FAUCET_COOLDOWN_SECS must be a positive integer")?;

        let bind_addr = lookup("FAUCET_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let records_path = lookup("FAUCET_RECORDS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".ckb-faucet")
                    .join("records.jsonl")
            });

        let network: Network = lookup("FAUCET_NETWORK")
            .unwrap_or_else(|| "testnet".to_string())
            .parse()
            .context("FAUCET_NETWORK must be testnet or mainnet")?;

        let github_api_url = lookup("GITHUB_API_URL")
            .unwrap_or_else(|| "https://api.github.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs: u64 = lookup("FAUCET_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("FAUCET_REQUEST_TIMEOUT_SECS must be a positive integer")?;

        Ok(Config {
            node_url,
            private_key,
            amount_shannons,
            fee_shannons,
            fee_rate,
            cooldown_secs,
            bind_addr,
            records_path,
            network,
            github_api_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Amount in whole CKB (for display).
    pub fn amount_ckb(&self) -> u64 {
        self.amount_shannons / SHANNONS_PER_CKB
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("node_url", &self.node_url)
            .field("private_key", &self.private_key)
            .field("amount_shannons", &self.amount_shannons)
            .field("fee_shannons", &self.fee_shannons)
            .field("fee_rate", &self.fee_rate)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("bind_addr", &self.bind_addr)
            .field("records_path", &self.records_path)
            .field("network", &self.network)
            .field("github_api_url", &self.github_api_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "e79f3207ea4980b7fed79956d5934249ceac4751a4fae01a0f7c4a96884bc4e3";

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("FAUCET_PRIVATE_KEY", KEY)]).unwrap();
        assert_eq!(config.node_url, "http://127.0.0.1:8114");
        assert_eq!(config.amount_ckb(), 5000);
        assert_eq!(config.fee_shannons, 1000);
        assert_eq!(config.fee_rate, 1000);
        assert_eq!(config.cooldown(), Duration::from_secs(86_400));
        assert_eq!(config.network, Network::Testnet);
        assert!(config.records_path.ends_with(".ckb-faucet/records.jsonl"));
        assert_eq!(config.github_api_url, "https://api.github.com");
    }

    #[test]
    fn private_key_required_and_validated() {
        assert!(load(&[]).is_err());
        assert!(load(&[("FAUCET_PRIVATE_KEY", "0x1234")]).is_err());
        assert!(load(&[("FAUCET_PRIVATE_KEY", &format!("0x{KEY}"))]).is_ok());
    }

    #[test]
    fn amount_below_minimum_cell_rejected() {
        let err = load(&[("FAUCET_PRIVATE_KEY", KEY), ("FAUCET_AMOUNT_CKB", "59")]).unwrap_err();
        assert!(err.to_string().contains("at least 60 CKB"));
        assert!(load(&[("FAUCET_PRIVATE_KEY", KEY), ("FAUCET_AMOUNT_CKB", "60")]).is_ok());
    }

    #[test]
    fn fee_rate_below_relay_minimum_rejected() {
        let err = load(&[("FAUCET_PRIVATE_KEY", KEY), ("FAUCET_FEE_RATE", "999")]).unwrap_err();
        assert!(err.to_string().contains("at least 1000 shannons per KB"));
        let config = load(&[("FAUCET_PRIVATE_KEY", KEY), ("FAUCET_FEE_RATE", "2500")]).unwrap();
        assert_eq!(config.fee_rate, 2500);
    }

    #[test]
    fn network_and_overrides() {
        let config = load(&[
            ("FAUCET_PRIVATE_KEY", KEY),
            ("FAUCET_NETWORK", "mainnet"),
            ("GITHUB_API_URL", "http://localhost:9000/"),
            ("FAUCET_RECORDS_PATH", "/tmp/records.jsonl"),
        ])
        .unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.github_api_url, "http://localhost:9000");
        assert_eq!(config.records_path, PathBuf::from("/tmp/records.jsonl"));
        assert!(load(&[("FAUCET_PRIVATE_KEY", KEY), ("FAUCET_NETWORK", "devnet")]).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let config = load(&[("FAUCET_PRIVATE_KEY", KEY)]).unwrap();
        assert!(!format!("{config:?}").contains(KEY));
    }
}
