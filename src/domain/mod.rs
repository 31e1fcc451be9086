//! Domain models for proofmark
//!
//! Proof records as persisted off-chain, and the on-chain view they are
//! reconciled against.

mod chain;
mod proof;
mod types;

pub use chain::*;
pub use proof::*;
pub use types::*;

pub use crate::crypto::ProofHash;
