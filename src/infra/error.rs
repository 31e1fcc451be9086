//! Error types for the proof lifecycle engine

use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

/// Errors raised by an off-chain proof store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("migration failed: {0}")]
    Migration(String),

    /// A stored row could not be decoded into a proof record
    #[error("corrupt proof row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// A status update matched no stored row
    #[error("no stored proof with hash {0}")]
    NoMatchingRows(String),

    /// Backend not reachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a wallet / chain provider capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The user declined the request in the wallet
    #[error("request rejected by user")]
    UserRejected,

    /// The wallet does not know the requested network
    #[error("network {0} is not known to the wallet")]
    UnrecognizedChain(u64),

    /// The signing account cannot pay for gas
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// JSON-RPC error response
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Connection or decoding failure below the JSON-RPC layer
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for wallet operations
pub type WalletResult<T> = std::result::Result<T, WalletError>;

/// Errors that can occur while generating, registering or reconciling proofs
#[derive(Error, Debug)]
pub enum ProofError {
    /// Hash is not 64 hex characters (optionally 0x-prefixed)
    #[error("invalid proof hash: {0:?}")]
    InvalidHash(String),

    /// Registration requested before any content was generated
    #[error("no proof hash available; generate content first")]
    MissingHash,

    /// Prompt length outside the accepted range
    #[error("prompt must be between 10 and 5000 characters (got {chars})")]
    InvalidPrompt { chars: usize },

    /// No authenticated principal
    #[error("not authenticated")]
    Unauthenticated,

    /// Off-chain store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Wallet is on a different network and could not be switched
    #[error("network mismatch: expected chain {expected}, wallet is on {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// No bytecode at the configured registry address
    #[error("proof registry contract not deployed at {0}")]
    ContractNotDeployed(Address),

    /// Gas estimation failed; nothing was submitted
    #[error("gas estimation failed: {0}")]
    EstimationError(String),

    /// The user declined a wallet prompt
    #[error("request rejected by user")]
    UserRejected,

    /// The signing account cannot pay for gas
    #[error("insufficient funds for gas: {0}")]
    InsufficientFunds(String),

    /// Transaction mined but reverted
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),

    /// No confirmation within the caller-supplied ceiling
    #[error("transaction {tx_hash} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },

    /// No off-chain record for the hash
    #[error("proof not found: {0}")]
    ProofNotFound(String),

    /// Chain read or submission failure
    #[error("chain error: {0}")]
    Chain(String),

    /// Content generation backend failure
    #[error("content generation failed: {0}")]
    Generation(String),

    /// Content generation backend rate limit hit
    #[error("content generation rate limit exceeded")]
    RateLimited,

    /// Content generation backend has no credits left
    #[error("content generation credits exhausted")]
    CreditsExhausted,

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification used by callers to decide what to tell the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input rejected before any network or wallet interaction
    Validation,
    /// The user can retry after acting (approve, switch network, fund wallet)
    UserAction,
    /// Network or backend hiccup; a later attempt may succeed
    Transient,
    /// The deployment is misconfigured; retrying will not help
    Configuration,
    /// Off-chain store failure
    Store,
    /// Requested record does not exist
    NotFound,
}

impl ProofError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProofError::InvalidHash(_)
            | ProofError::MissingHash
            | ProofError::InvalidPrompt { .. } => ErrorClass::Validation,
            ProofError::Unauthenticated
            | ProofError::NetworkMismatch { .. }
            | ProofError::UserRejected
            | ProofError::InsufficientFunds(_)
            | ProofError::CreditsExhausted => ErrorClass::UserAction,
            ProofError::EstimationError(_)
            | ProofError::TransactionReverted(_)
            | ProofError::ConfirmationTimeout { .. }
            | ProofError::Chain(_)
            | ProofError::Generation(_)
            | ProofError::RateLimited => ErrorClass::Transient,
            ProofError::ContractNotDeployed(_) | ProofError::Configuration(_) => {
                ErrorClass::Configuration
            }
            ProofError::Store(_) => ErrorClass::Store,
            ProofError::ProofNotFound(_) => ErrorClass::NotFound,
        }
    }

    /// Whether a caller-driven retry can succeed without changing configuration
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::UserAction | ErrorClass::Transient)
    }
}

impl From<sqlx::Error> for ProofError {
    fn from(err: sqlx::Error) -> Self {
        ProofError::Store(StoreError::Database(err))
    }
}

/// Result type for proof lifecycle operations
pub type Result<T> = std::result::Result<T, ProofError>;
