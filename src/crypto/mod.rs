//! Cryptographic utilities for proofmark
//!
//! Provides:
//! - Proof hash canonicalization between storage and chain form
//! - Domain-separated SHA-256 proof digests

mod hash;

pub use hash::*;
