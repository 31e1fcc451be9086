//! SQLite implementation of the off-chain proof store

mod proofs;

pub use proofs::*;
