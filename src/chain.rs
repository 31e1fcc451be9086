//! Chain client for the proof registry contract
//!
//! Wraps a [`WalletProvider`] with the registry ABI and the safeguards every
//! caller needs: network matching, contract presence, the zero-address
//! sentinel, a fixed gas safety margin and a bounded confirmation wait.

use std::time::Duration;

use alloy::primitives::{Address, TxHash, B256};
use alloy::sol;
use alloy::sol_types::SolCall;
use tracing::{debug, info, warn};

use crate::crypto::chain_form_hex;
use crate::domain::{ChainProofState, NetworkParams, TxReceipt, TxRequest};
use crate::infra::{ProofError, Result, WalletError, WalletProvider};

sol! {
    /// On-chain proof registry
    interface IProofRegistry {
        event ProofRegistered(bytes32 indexed hash, address indexed owner, uint256 timestamp);

        function registerProof(bytes32 hash) external;

        function verifyProof(bytes32 hash) external view returns (address owner);
    }
}

/// Gas limit is the estimate scaled by this percentage (1.20x)
pub const GAS_MARGIN_PERCENT: u64 = 120;

/// Largest estimate whose padded limit still fits in a `u64`
pub const MAX_GAS_ESTIMATE: u64 = u64::MAX / GAS_MARGIN_PERCENT * 100;

/// Apply the gas safety margin, rounding up.
///
/// For `0 < estimate <= MAX_GAS_ESTIMATE` the limit is strictly above the
/// estimate. Larger values saturate at `u64::MAX`;
/// [`ChainClient::estimate_register_gas`] rejects them before they get here.
pub fn gas_limit_with_margin(estimate: u64) -> u64 {
    let padded = (u128::from(estimate) * u128::from(GAS_MARGIN_PERCENT)).div_ceil(100);
    u64::try_from(padded).unwrap_or(u64::MAX)
}

/// Map wallet errors that mean the same thing at every step
fn common_error(err: WalletError, otherwise: impl FnOnce(WalletError) -> ProofError) -> ProofError {
    match err {
        WalletError::UserRejected => ProofError::UserRejected,
        WalletError::InsufficientFunds(msg) => ProofError::InsufficientFunds(msg),
        other => otherwise(other),
    }
}

fn chain_error(err: WalletError) -> ProofError {
    ProofError::Chain(err.to_string())
}

/// Registry-aware client over a wallet connection
pub struct ChainClient<W> {
    wallet: W,
    registry: Address,
    network: NetworkParams,
}

impl<W: WalletProvider> ChainClient<W> {
    pub fn new(wallet: W, registry: Address, network: NetworkParams) -> Self {
        Self {
            wallet,
            registry,
            network,
        }
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    /// Parameters of the one supported network
    pub fn network(&self) -> &NetworkParams {
        &self.network
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.network.chain_id
    }

    /// Network the wallet currently points at
    pub async fn get_active_network(&self) -> Result<u64> {
        self.wallet
            .active_network()
            .await
            .map_err(|e| common_error(e, chain_error))
    }

    /// First account the wallet exposes; used as the transaction sender
    pub async fn request_account(&self) -> Result<Address> {
        let accounts = self
            .wallet
            .request_accounts()
            .await
            .map_err(|e| common_error(e, chain_error))?;
        accounts
            .into_iter()
            .next()
            .ok_or_else(|| ProofError::Configuration("wallet exposed no accounts".to_string()))
    }

    /// Make sure the wallet is on `expected`.
    ///
    /// Switches when needed; an unknown network is added from `expected` and
    /// the switch retried once. Any failure, including a user decline, is a
    /// `NetworkMismatch`.
    pub async fn ensure_network(&self, expected: &NetworkParams) -> Result<()> {
        let active = self.get_active_network().await?;
        if active == expected.chain_id {
            return Ok(());
        }

        let mismatch = ProofError::NetworkMismatch {
            expected: expected.chain_id,
            actual: active,
        };

        info!(
            active,
            expected = expected.chain_id,
            "requesting wallet network switch"
        );

        match self.wallet.switch_network(expected.chain_id).await {
            Ok(()) => Ok(()),
            Err(WalletError::UnrecognizedChain(_)) => {
                info!(chain_id = expected.chain_id, "network unknown to wallet, adding it");
                if let Err(e) = self.wallet.add_network(expected).await {
                    warn!(error = %e, "add network failed");
                    return Err(mismatch);
                }
                self.wallet.switch_network(expected.chain_id).await.map_err(|e| {
                    warn!(error = %e, "switch after add failed");
                    mismatch
                })
            }
            Err(e) => {
                warn!(error = %e, "network switch failed");
                Err(mismatch)
            }
        }
    }

    /// Whether any bytecode is deployed at `address`
    pub async fn has_contract_code(&self, address: Address) -> Result<bool> {
        let code = self
            .wallet
            .get_code(address)
            .await
            .map_err(|e| common_error(e, chain_error))?;
        Ok(!code.is_empty())
    }

    /// Pre-flight check that the registry exists on the active network
    pub async fn ensure_registry_deployed(&self) -> Result<()> {
        if self.has_contract_code(self.registry).await? {
            Ok(())
        } else {
            Err(ProofError::ContractNotDeployed(self.registry))
        }
    }

    /// Owner recorded for `chain_hash`; the zero address means not registered
    pub async fn read_proof_owner(&self, chain_hash: B256) -> Result<Address> {
        let data = IProofRegistry::verifyProofCall { hash: chain_hash }.abi_encode();
        let request = TxRequest::call(self.registry, data);

        let output = self
            .wallet
            .call(&request)
            .await
            .map_err(|e| common_error(e, chain_error))?;

        let decoded = IProofRegistry::verifyProofCall::abi_decode_returns(&output, true)
            .map_err(|e| ProofError::Chain(format!("malformed verifyProof result: {e}")))?;

        debug!(hash = %chain_form_hex(&chain_hash), owner = %decoded.owner, "read proof owner");
        Ok(decoded.owner)
    }

    pub async fn read_proof_state(&self, chain_hash: B256) -> Result<ChainProofState> {
        self.read_proof_owner(chain_hash)
            .await
            .map(ChainProofState::from_owner)
    }

    fn register_request(&self, from: Address, chain_hash: B256) -> TxRequest {
        let data = IProofRegistry::registerProofCall { hash: chain_hash }.abi_encode();
        TxRequest::call(self.registry, data).with_from(from)
    }

    /// Simulate `registerProof`; never prompts the user
    pub async fn estimate_register_gas(&self, from: Address, chain_hash: B256) -> Result<u64> {
        let request = self.register_request(from, chain_hash);
        let estimate = self
            .wallet
            .estimate_gas(&request)
            .await
            .map_err(|e| common_error(e, |e| ProofError::EstimationError(e.to_string())))?;

        if estimate > MAX_GAS_ESTIMATE {
            return Err(ProofError::EstimationError(format!(
                "gas estimate {estimate} leaves no room for the safety margin"
            )));
        }
        Ok(estimate)
    }

    /// Submit `registerProof` with the gas margin applied to `gas_estimate`
    pub async fn submit_register(
        &self,
        from: Address,
        chain_hash: B256,
        gas_estimate: u64,
    ) -> Result<TxHash> {
        let gas_limit = gas_limit_with_margin(gas_estimate);
        let request = self
            .register_request(from, chain_hash)
            .with_gas_limit(gas_limit);

        let tx_hash = self
            .wallet
            .send_transaction(&request)
            .await
            .map_err(|e| common_error(e, chain_error))?;

        info!(
            hash = %chain_form_hex(&chain_hash),
            tx_hash = %chain_form_hex(&tx_hash),
            gas_estimate,
            gas_limit,
            "registration submitted"
        );
        Ok(tx_hash)
    }

    /// Wait for one confirmation, giving up after `timeout`.
    ///
    /// Abandoning the wait does not retract the transaction.
    pub async fn await_confirmation(&self, tx_hash: TxHash, timeout: Duration) -> Result<TxReceipt> {
        let receipt = tokio::time::timeout(timeout, self.wallet.wait_for_receipt(tx_hash))
            .await
            .map_err(|_| ProofError::ConfirmationTimeout {
                tx_hash,
                waited: timeout,
            })?
            .map_err(|e| common_error(e, chain_error))?;

        if !receipt.success {
            return Err(ProofError::TransactionReverted(tx_hash));
        }
        Ok(receipt)
    }
}
