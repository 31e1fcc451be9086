//! Registration orchestrator
//!
//! Drives one storage-form hash through
//!
//! ```text
//! Idle → NetworkChecking → DuplicateChecking → Estimating
//!      → AwaitingSignature → Submitted → Confirmed | Failed
//! ```
//!
//! with `AlreadyRegistered` as a terminal, non-error exit from
//! `DuplicateChecking`. Nothing is written off-chain unless the transaction
//! is confirmed, and a failed write after confirmation is only a warning.
//!
//! The duplicate check is a read, not a lock: two sessions racing on the
//! same hash can both submit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::chain::{gas_limit_with_margin, ChainClient};
use crate::crypto::{chain_form_hex, from_chain_form, hash_preview, to_chain_form, ProofHash};
use crate::domain::{StatusUpdate, VerificationStatus};
use crate::infra::{ProofError, ProofStore, WalletProvider};

/// Default ceiling for the confirmation wait
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPhase {
    Idle,
    NetworkChecking,
    DuplicateChecking,
    Estimating,
    AwaitingSignature,
    Submitted,
    Confirmed,
    AlreadyRegistered,
    Failed,
}

impl RegistrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationPhase::Idle => "idle",
            RegistrationPhase::NetworkChecking => "network_checking",
            RegistrationPhase::DuplicateChecking => "duplicate_checking",
            RegistrationPhase::Estimating => "estimating",
            RegistrationPhase::AwaitingSignature => "awaiting_signature",
            RegistrationPhase::Submitted => "submitted",
            RegistrationPhase::Confirmed => "confirmed",
            RegistrationPhase::AlreadyRegistered => "already_registered",
            RegistrationPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    /// Caller-supplied ceiling for the confirmation wait
    pub confirmation_timeout: Duration,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

/// A registration that reached one confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedRegistration {
    pub hash: ProofHash,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_estimate: u64,
    pub gas_limit: u64,
    /// Set when the off-chain status write failed after confirmation
    pub store_warning: Option<String>,
}

/// Successful terminal outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Confirmed(ConfirmedRegistration),
    /// The hash already has an owner; no transaction was prompted
    AlreadyRegistered { hash: ProofHash, owner: Address },
}

impl RegistrationOutcome {
    pub fn phase(&self) -> RegistrationPhase {
        match self {
            RegistrationOutcome::Confirmed(_) => RegistrationPhase::Confirmed,
            RegistrationOutcome::AlreadyRegistered { .. } => RegistrationPhase::AlreadyRegistered,
        }
    }

    pub fn status(&self) -> VerificationStatus {
        match self {
            RegistrationOutcome::Confirmed(_) => VerificationStatus::Verified,
            RegistrationOutcome::AlreadyRegistered { .. } => VerificationStatus::AlreadyRegistered,
        }
    }
}

/// Failed attempt, with the phase it failed in
#[derive(Debug, Error)]
#[error("registration failed while {phase}: {source}")]
pub struct RegistrationError {
    pub phase: RegistrationPhase,
    #[source]
    pub source: ProofError,
}

impl RegistrationError {
    pub fn cause(&self) -> &ProofError {
        &self.source
    }
}

/// Tracks the current phase of one attempt
struct Attempt<'a> {
    hash: &'a str,
    phase: RegistrationPhase,
}

impl<'a> Attempt<'a> {
    fn new(hash: &'a str) -> Self {
        Self {
            hash: hash_preview(hash),
            phase: RegistrationPhase::Idle,
        }
    }

    fn advance(&mut self, next: RegistrationPhase) {
        debug!(hash = self.hash, from = %self.phase, to = %next, "registration transition");
        self.phase = next;
    }

    fn fail(&self, source: ProofError) -> RegistrationError {
        warn!(hash = self.hash, phase = %self.phase, error = %source, "registration failed");
        RegistrationError {
            phase: self.phase,
            source,
        }
    }
}

/// Registration state machine over a chain client and an off-chain store
pub struct RegistrationOrchestrator<W, S> {
    chain: Arc<ChainClient<W>>,
    store: Arc<S>,
    options: RegistrationOptions,
}

impl<W, S> RegistrationOrchestrator<W, S>
where
    W: WalletProvider,
    S: ProofStore,
{
    pub fn new(chain: Arc<ChainClient<W>>, store: Arc<S>, options: RegistrationOptions) -> Self {
        Self {
            chain,
            store,
            options,
        }
    }

    /// Register a storage-form hash.
    ///
    /// `None` (or an empty string) means no content has been generated yet.
    /// Validation failures happen before any wallet interaction.
    #[instrument(skip_all, fields(hash = hash.map(hash_preview).unwrap_or_default()))]
    pub async fn register(
        &self,
        hash: Option<&str>,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let raw = hash.filter(|h| !h.is_empty()).unwrap_or_default();
        let mut attempt = Attempt::new(raw);

        if raw.is_empty() {
            return Err(attempt.fail(ProofError::MissingHash));
        }
        let chain_hash = to_chain_form(raw).map_err(|e| attempt.fail(e))?;
        let hash = from_chain_form(&chain_hash);

        if self.chain.registry() == Address::ZERO {
            return Err(attempt.fail(ProofError::Configuration(
                "proof registry address is not set".to_string(),
            )));
        }

        attempt.advance(RegistrationPhase::NetworkChecking);
        let from = self
            .chain
            .request_account()
            .await
            .map_err(|e| attempt.fail(e))?;
        self.chain
            .ensure_network(self.chain.network())
            .await
            .map_err(|e| attempt.fail(e))?;
        self.chain
            .ensure_registry_deployed()
            .await
            .map_err(|e| attempt.fail(e))?;

        attempt.advance(RegistrationPhase::DuplicateChecking);
        let owner = self
            .chain
            .read_proof_owner(chain_hash)
            .await
            .map_err(|e| attempt.fail(e))?;
        if owner != Address::ZERO {
            attempt.advance(RegistrationPhase::AlreadyRegistered);
            info!(hash = %hash, owner = %owner, "proof already registered on-chain");
            return Ok(RegistrationOutcome::AlreadyRegistered { hash, owner });
        }

        attempt.advance(RegistrationPhase::Estimating);
        let gas_estimate = self
            .chain
            .estimate_register_gas(from, chain_hash)
            .await
            .map_err(|e| attempt.fail(e))?;

        attempt.advance(RegistrationPhase::AwaitingSignature);
        let tx_hash = self
            .chain
            .submit_register(from, chain_hash, gas_estimate)
            .await
            .map_err(|e| attempt.fail(e))?;

        // From here on the transaction may land regardless of what we observe;
        // the off-chain record stays pending until confirmation or reconciliation.
        attempt.advance(RegistrationPhase::Submitted);
        let receipt = self
            .chain
            .await_confirmation(tx_hash, self.options.confirmation_timeout)
            .await
            .map_err(|e| attempt.fail(e))?;

        attempt.advance(RegistrationPhase::Confirmed);
        info!(
            hash = %hash,
            tx_hash = %chain_form_hex(&tx_hash),
            block = ?receipt.block_number,
            "proof registered on-chain"
        );

        let store_warning = match self
            .store
            .update_status(&hash, StatusUpdate::verified(tx_hash))
            .await
        {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    hash = %hash,
                    tx_hash = %chain_form_hex(&tx_hash),
                    error = %e,
                    "on-chain registration confirmed but off-chain status update failed"
                );
                Some(e.to_string())
            }
        };

        Ok(RegistrationOutcome::Confirmed(ConfirmedRegistration {
            hash,
            tx_hash,
            block_number: receipt.block_number,
            gas_estimate,
            gas_limit: gas_limit_with_margin(gas_estimate),
            store_warning,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NetworkParams, TxReceipt};
    use crate::infra::{MockProofStore, MockWalletProvider, StoreError, WalletError};
    use alloy::primitives::Bytes;

    const REGISTRY: Address = Address::repeat_byte(0xcc);
    const SIGNER: Address = Address::repeat_byte(0x01);

    fn sample_hash() -> String {
        "abc123".to_string() + &"0".repeat(58)
    }

    fn ready_wallet() -> MockWalletProvider {
        let mut wallet = MockWalletProvider::new();
        wallet
            .expect_request_accounts()
            .returning(|| Ok(vec![SIGNER]));
        wallet.expect_active_network().returning(|| Ok(80002));
        wallet
            .expect_get_code()
            .returning(|_| Ok(Bytes::from_static(&[0x60, 0x80])));
        wallet
    }

    fn orchestrator(
        wallet: MockWalletProvider,
        store: MockProofStore,
    ) -> RegistrationOrchestrator<MockWalletProvider, MockProofStore> {
        RegistrationOrchestrator::new(
            Arc::new(ChainClient::new(
                wallet,
                REGISTRY,
                NetworkParams::polygon_amoy(),
            )),
            Arc::new(store),
            RegistrationOptions {
                confirmation_timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn test_missing_hash_touches_nothing() {
        let wallet = MockWalletProvider::new();
        let store = MockProofStore::new();
        let orch = orchestrator(wallet, store);

        let err = orch.register(None).await.unwrap_err();
        assert!(matches!(err.cause(), ProofError::MissingHash));
        assert_eq!(err.phase, RegistrationPhase::Idle);

        let err = orch.register(Some("")).await.unwrap_err();
        assert!(matches!(err.cause(), ProofError::MissingHash));
    }

    #[tokio::test]
    async fn test_invalid_hash_rejected_before_wallet() {
        let orch = orchestrator(MockWalletProvider::new(), MockProofStore::new());
        let err = orch
            .register(Some(&format!("0x{}", sample_hash())))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), ProofError::InvalidHash(_)));
    }

    #[tokio::test]
    async fn test_happy_path_updates_store() {
        let mut wallet = ready_wallet();
        wallet
            .expect_call()
            .returning(|_| Ok(Bytes::from(Address::ZERO.into_word().to_vec())));
        wallet.expect_estimate_gas().returning(|_| Ok(100_000));
        wallet
            .expect_send_transaction()
            .withf(|req| req.gas_limit == Some(120_000) && req.from == Some(SIGNER))
            .times(1)
            .returning(|_| Ok(TxHash::repeat_byte(0x77)));
        wallet.expect_wait_for_receipt().returning(|tx| {
            Ok(TxReceipt {
                tx_hash: tx,
                block_number: Some(42),
                gas_used: 90_000,
                success: true,
            })
        });

        let hash = sample_hash();
        let expected = ProofHash::parse(&hash).unwrap();
        let mut store = MockProofStore::new();
        store
            .expect_update_status()
            .withf(move |h, update| {
                h == &expected && *update == StatusUpdate::verified(TxHash::repeat_byte(0x77))
            })
            .times(1)
            .returning(|_, _| Ok(1));

        let outcome = orchestrator(wallet, store)
            .register(Some(&hash))
            .await
            .unwrap();
        match outcome {
            RegistrationOutcome::Confirmed(confirmed) => {
                assert_eq!(confirmed.tx_hash, TxHash::repeat_byte(0x77));
                assert_eq!(confirmed.block_number, Some(42));
                assert_eq!(confirmed.gas_limit, 120_000);
                assert!(confirmed.store_warning.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_already_registered_short_circuits() {
        let mut wallet = ready_wallet();
        let owner = Address::repeat_byte(0xbe);
        wallet
            .expect_call()
            .returning(move |_| Ok(Bytes::from(owner.into_word().to_vec())));
        wallet.expect_estimate_gas().never();
        wallet.expect_send_transaction().never();

        let mut store = MockProofStore::new();
        store.expect_update_status().never();

        let outcome = orchestrator(wallet, store)
            .register(Some(&sample_hash()))
            .await
            .unwrap();
        assert_eq!(outcome.phase(), RegistrationPhase::AlreadyRegistered);
        assert_eq!(outcome.status(), VerificationStatus::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_estimation_failure_never_prompts() {
        let mut wallet = ready_wallet();
        wallet
            .expect_call()
            .returning(|_| Ok(Bytes::from(Address::ZERO.into_word().to_vec())));
        wallet.expect_estimate_gas().returning(|_| {
            Err(WalletError::Rpc {
                code: -32000,
                message: "execution reverted".into(),
            })
        });
        wallet.expect_send_transaction().never();

        let err = orchestrator(wallet, MockProofStore::new())
            .register(Some(&sample_hash()))
            .await
            .unwrap_err();
        assert_eq!(err.phase, RegistrationPhase::Estimating);
        assert!(matches!(err.cause(), ProofError::EstimationError(_)));
    }

    #[tokio::test]
    async fn test_user_rejection_at_signature() {
        let mut wallet = ready_wallet();
        wallet
            .expect_call()
            .returning(|_| Ok(Bytes::from(Address::ZERO.into_word().to_vec())));
        wallet.expect_estimate_gas().returning(|_| Ok(50_000));
        wallet
            .expect_send_transaction()
            .returning(|_| Err(WalletError::UserRejected));
        wallet.expect_wait_for_receipt().never();

        let mut store = MockProofStore::new();
        store.expect_update_status().never();

        let err = orchestrator(wallet, store)
            .register(Some(&sample_hash()))
            .await
            .unwrap_err();
        assert_eq!(err.phase, RegistrationPhase::AwaitingSignature);
        assert!(matches!(err.cause(), ProofError::UserRejected));
    }

    #[tokio::test]
    async fn test_store_failure_after_confirmation_is_a_warning() {
        let mut wallet = ready_wallet();
        wallet
            .expect_call()
            .returning(|_| Ok(Bytes::from(Address::ZERO.into_word().to_vec())));
        wallet.expect_estimate_gas().returning(|_| Ok(50_000));
        wallet
            .expect_send_transaction()
            .returning(|_| Ok(TxHash::repeat_byte(3)));
        wallet.expect_wait_for_receipt().returning(|tx| {
            Ok(TxReceipt {
                tx_hash: tx,
                block_number: Some(1),
                gas_used: 40_000,
                success: true,
            })
        });

        let mut store = MockProofStore::new();
        store
            .expect_update_status()
            .returning(|_, _| Err(StoreError::Unavailable("connection reset".into())));

        let outcome = orchestrator(wallet, store)
            .register(Some(&sample_hash()))
            .await
            .unwrap();
        match outcome {
            RegistrationOutcome::Confirmed(confirmed) => {
                assert!(confirmed
                    .store_warning
                    .as_deref()
                    .is_some_and(|w| w.contains("connection reset")));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undeployed_registry_is_configuration_fault() {
        let mut wallet = MockWalletProvider::new();
        wallet
            .expect_request_accounts()
            .returning(|| Ok(vec![SIGNER]));
        wallet.expect_active_network().returning(|| Ok(80002));
        wallet.expect_get_code().returning(|_| Ok(Bytes::new()));
        wallet.expect_call().never();

        let err = orchestrator(wallet, MockProofStore::new())
            .register(Some(&sample_hash()))
            .await
            .unwrap_err();
        assert_eq!(err.phase, RegistrationPhase::NetworkChecking);
        assert!(matches!(err.cause(), ProofError::ContractNotDeployed(_)));
    }
}
