//! Proofmark Library
//!
//! Proof lifecycle engine for AI-generated content: derive a canonical
//! content hash, persist a pending record off-chain, anchor the hash in an
//! on-chain registry, and reconcile stored records against chain state.
//!
//! ## Modules
//!
//! - [`crypto`] - Hash canonicalization and the local proof digest
//! - [`domain`] - Core domain types (proof records, chain views)
//! - [`infra`] - Errors, collaborator traits, SQLite and in-memory stores
//! - [`chain`] - Registry-aware chain client
//! - [`anchor`] - Alloy-backed wallet provider
//! - [`registration`] - Registration state machine
//! - [`reconcile`] - Reconciliation engine
//! - [`generation`] - Content generation flow
//! - [`config`] - Environment configuration
//! - [`telemetry`] - Logging setup

pub mod anchor;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod generation;
pub mod infra;
pub mod migrations;
pub mod reconcile;
pub mod registration;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    ChainProofState, NetworkParams, NewProof, OwnerId, ProofHash, ProofId, ProofRecord,
    ProofStatus, Prompt, StatusUpdate, VerificationStatus,
};

pub use infra::{
    ErrorClass, ProofError, ProofStore, Result, StoreError, WalletError, WalletProvider,
};

pub use chain::ChainClient;
pub use reconcile::{ReconcileOptions, ReconcileReport, ReconciliationEngine};
pub use registration::{RegistrationOptions, RegistrationOrchestrator, RegistrationOutcome};
