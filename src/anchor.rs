//! Alloy-backed wallet provider
//!
//! Talks JSON-RPC to the configured endpoint. With a private key the
//! transaction is signed locally through alloy's recommended fillers;
//! without one the endpoint is treated as a wallet that holds the
//! account and signs on `eth_sendTransaction` (and may prompt the user).

use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::TransportError;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::ProofmarkConfig;
use crate::domain::{NetworkParams, TxReceipt, TxRequest};
use crate::infra::{ProofError, Result, WalletError, WalletProvider, WalletResult};

/// EIP-1193 code for a request the user declined
pub const USER_REJECTED_CODE: i64 = 4001;

/// Wallet code for a chain it has not been told about (EIP-3326)
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Anchor connection configuration
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Local signing key; `None` delegates signing to the endpoint
    pub private_key: Option<String>,
    /// Chain the registry lives on
    pub chain_id: u64,
    /// Delay between receipt polls
    pub receipt_poll_interval: Duration,
}

impl From<&ProofmarkConfig> for AnchorConfig {
    fn from(config: &ProofmarkConfig) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            private_key: config.private_key.clone(),
            chain_id: config.network.chain_id,
            receipt_poll_interval: config.receipt_poll_interval,
        }
    }
}

/// Classify a JSON-RPC failure
fn wallet_error(err: TransportError) -> WalletError {
    match err.as_error_resp() {
        Some(payload) if payload.code == USER_REJECTED_CODE => WalletError::UserRejected,
        Some(payload) if payload.message.to_lowercase().contains("insufficient funds") => {
            WalletError::InsufficientFunds(payload.message.to_string())
        }
        Some(payload) => WalletError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        None => WalletError::Transport(err.to_string()),
    }
}

fn to_rpc_request(request: &TxRequest) -> TransactionRequest {
    let mut tx = TransactionRequest::default()
        .with_to(request.to)
        .with_input(request.data.clone());
    if let Some(from) = request.from {
        tx = tx.with_from(from);
    }
    if let Some(gas_limit) = request.gas_limit {
        tx = tx.with_gas_limit(gas_limit);
    }
    tx
}

/// [`WalletProvider`] over alloy's HTTP provider
pub struct AlloyWallet {
    config: AnchorConfig,
    rpc_url: Url,
    signer: Option<PrivateKeySigner>,
}

impl AlloyWallet {
    pub fn new(config: AnchorConfig) -> Result<Self> {
        let rpc_url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| ProofError::Configuration(format!("invalid RPC URL: {e}")))?;

        let signer = config
            .private_key
            .as_deref()
            .map(|key| key.parse::<PrivateKeySigner>())
            .transpose()
            .map_err(|e| ProofError::Configuration(format!("invalid private key: {e}")))?;

        Ok(Self {
            config,
            rpc_url,
            signer,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Address of the local signer, if one is configured
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }
}

#[async_trait]
impl WalletProvider for AlloyWallet {
    async fn active_network(&self) -> WalletResult<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider.get_chain_id().await.map_err(wallet_error)
    }

    async fn request_accounts(&self) -> WalletResult<Vec<Address>> {
        if let Some(address) = self.signer_address() {
            return Ok(vec![address]);
        }
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider
            .raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), json!([]))
            .await
            .map_err(wallet_error)
    }

    async fn switch_network(&self, chain_id: u64) -> WalletResult<()> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let params = json!([{ "chainId": format!("{chain_id:#x}") }]);
        match provider
            .raw_request::<_, serde_json::Value>("wallet_switchEthereumChain".into(), params)
            .await
        {
            Ok(_) => {
                info!(chain_id, "wallet switched network");
                Ok(())
            }
            Err(e) => match wallet_error(e) {
                WalletError::Rpc { code, .. } if code == UNRECOGNIZED_CHAIN_CODE => {
                    Err(WalletError::UnrecognizedChain(chain_id))
                }
                other => Err(other),
            },
        }
    }

    async fn add_network(&self, params: &NetworkParams) -> WalletResult<()> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider
            .raw_request::<_, serde_json::Value>(
                "wallet_addEthereumChain".into(),
                json!([params.to_add_chain_request()]),
            )
            .await
            .map_err(wallet_error)?;
        info!(chain_id = params.chain_id, "wallet added network");
        Ok(())
    }

    async fn get_code(&self, address: Address) -> WalletResult<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider.get_code_at(address).await.map_err(wallet_error)
    }

    async fn call(&self, request: &TxRequest) -> WalletResult<Bytes> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider
            .call(&to_rpc_request(request))
            .await
            .map_err(wallet_error)
    }

    async fn estimate_gas(&self, request: &TxRequest) -> WalletResult<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        provider
            .estimate_gas(&to_rpc_request(request))
            .await
            .map_err(wallet_error)
    }

    async fn send_transaction(&self, request: &TxRequest) -> WalletResult<TxHash> {
        let tx = to_rpc_request(request);

        let tx_hash = match &self.signer {
            Some(signer) => {
                let provider = ProviderBuilder::new()
                    .with_recommended_fillers()
                    .wallet(EthereumWallet::from(signer.clone()))
                    .on_http(self.rpc_url.clone());
                let pending = provider.send_transaction(tx).await.map_err(wallet_error)?;
                *pending.tx_hash()
            }
            None => {
                let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
                provider
                    .raw_request::<_, TxHash>("eth_sendTransaction".into(), [tx])
                    .await
                    .map_err(wallet_error)?
            }
        };

        info!(tx_hash = %tx_hash, "transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> WalletResult<TxReceipt> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        loop {
            match provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(wallet_error)?
            {
                Some(receipt) => {
                    let gas_used = u64::try_from(receipt.gas_used).unwrap_or(u64::MAX);
                    return Ok(TxReceipt {
                        tx_hash,
                        block_number: receipt.block_number,
                        gas_used,
                        success: receipt.status(),
                    });
                }
                None => {
                    debug!(tx_hash = %tx_hash, "receipt not yet available");
                    tokio::time::sleep(self.config.receipt_poll_interval).await;
                }
            }
        }
    }
}
