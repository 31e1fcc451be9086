//! Infrastructure layer for proofmark
//!
//! Contains trait definitions and implementations for:
//! - Off-chain proof storage (SQLite, in-memory)
//! - Wallet / chain provider capabilities
//! - Content generation and authentication seams

mod error;
mod memory;
pub mod sqlite;
mod traits;

pub use error::*;
pub use memory::InMemoryProofStore;
pub use sqlite::SqliteProofStore;
pub use traits::*;
