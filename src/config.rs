//! Environment configuration

use std::time::Duration;

use alloy::primitives::Address;

use crate::domain::{NativeCurrency, NetworkParams};
use crate::infra::{ProofError, Result};
use crate::registration::DEFAULT_CONFIRMATION_TIMEOUT;

/// Proof lifecycle configuration
#[derive(Debug, Clone)]
pub struct ProofmarkConfig {
    /// SQLite database URL
    pub database_url: String,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// The one network the registry is deployed on
    pub network: NetworkParams,
    /// Proof registry contract address; never zero
    pub registry_address: Address,
    /// Local signing key (hex)
    pub private_key: Option<String>,
    /// Ceiling for the confirmation wait
    pub confirmation_timeout: Duration,
    /// Delay between receipt polls
    pub receipt_poll_interval: Duration,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a registry address, rejecting the zero address
pub fn parse_registry_address(raw: &str) -> Result<Address> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|e| ProofError::Configuration(format!("invalid PROOF_REGISTRY_ADDRESS: {e}")))?;
    if address == Address::ZERO {
        return Err(ProofError::Configuration(
            "PROOF_REGISTRY_ADDRESS is the zero address; deploy the registry first".to_string(),
        ));
    }
    Ok(address)
}

impl ProofmarkConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = NetworkParams::polygon_amoy();

        let rpc_url = env_or("CHAIN_RPC_URL", &defaults.rpc_urls[0]);
        let explorer = env_or("CHAIN_EXPLORER_URL", &defaults.block_explorer_urls[0]);
        let network = NetworkParams {
            chain_id: env_parse("CHAIN_ID", defaults.chain_id),
            chain_name: env_or("CHAIN_NAME", &defaults.chain_name),
            native_currency: NativeCurrency {
                symbol: env_or("CHAIN_CURRENCY_SYMBOL", &defaults.native_currency.symbol),
                ..defaults.native_currency
            },
            rpc_urls: vec![rpc_url.clone()],
            block_explorer_urls: vec![explorer],
        };

        let registry_address = std::env::var("PROOF_REGISTRY_ADDRESS")
            .map_err(|_| ProofError::Configuration("PROOF_REGISTRY_ADDRESS is not set".to_string()))
            .and_then(|raw| parse_registry_address(&raw))?;

        let private_key = std::env::var("WALLET_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite://proofmark.db?mode=rwc"),
            rpc_url,
            network,
            registry_address,
            private_key,
            confirmation_timeout: Duration::from_secs(env_parse(
                "CONFIRMATION_TIMEOUT_SECS",
                DEFAULT_CONFIRMATION_TIMEOUT.as_secs(),
            )),
            receipt_poll_interval: Duration::from_millis(env_parse("RECEIPT_POLL_INTERVAL_MS", 2_000)),
        })
    }
}
