//! Trait definitions for the collaborators the proof lifecycle depends on

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::crypto::ProofHash;
use crate::domain::{
    NetworkParams, NewProof, OwnerId, Prompt, ProofRecord, StatusUpdate, TxReceipt, TxRequest,
};

use super::{Result, StoreResult, WalletResult};

/// Off-chain record store for proofs (table `proofs`).
///
/// Pure query shaping: no business rules live here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Create a new record in `pending` state.
    ///
    /// Hash uniqueness is not enforced; retried prompts may produce
    /// several rows for the same hash.
    async fn insert(&self, proof: NewProof) -> StoreResult<ProofRecord>;

    /// Snapshot of all records for an owner, newest first
    async fn list_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ProofRecord>>;

    /// Exact match on the canonical hash; the newest row wins when
    /// several share a hash
    async fn find_by_hash(&self, hash: &ProofHash) -> StoreResult<Option<ProofRecord>>;

    /// Partial update of every row with this hash. Returns rows touched;
    /// zero rows is an error.
    async fn update_status(&self, hash: &ProofHash, update: StatusUpdate) -> StoreResult<u64>;
}

/// Capabilities of a wallet-backed chain connection
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Chain id the wallet currently points at
    async fn active_network(&self) -> WalletResult<u64>;

    /// Ask the wallet to expose its accounts
    async fn request_accounts(&self) -> WalletResult<Vec<Address>>;

    /// EIP-3326 network switch
    async fn switch_network(&self, chain_id: u64) -> WalletResult<()>;

    /// EIP-3085 network addition
    async fn add_network(&self, params: &NetworkParams) -> WalletResult<()>;

    /// Deployed bytecode at an address (empty when nothing is deployed)
    async fn get_code(&self, address: Address) -> WalletResult<Bytes>;

    /// Read-only contract call
    async fn call(&self, request: &TxRequest) -> WalletResult<Bytes>;

    /// Simulate a transaction and return its gas estimate
    async fn estimate_gas(&self, request: &TxRequest) -> WalletResult<u64>;

    /// Sign (prompting the user where applicable) and broadcast
    async fn send_transaction(&self, request: &TxRequest) -> WalletResult<TxHash>;

    /// Suspend until the transaction has one confirmation
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> WalletResult<TxReceipt>;
}

/// Output of a content generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub content: String,
    /// Server-computed hash in any accepted raw form
    pub hash: String,
    pub generated_at: DateTime<Utc>,
}

/// Opaque text generation backend
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedContent>;
}

/// Session lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The signed-in principal, if any
    async fn current_user(&self) -> Option<OwnerId>;
}
