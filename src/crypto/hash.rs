//! Proof hash canonicalization and digesting
//!
//! A proof hash has exactly two representations:
//! - storage form: 64 lower-case hex characters, no prefix (off-chain join key)
//! - chain form: `bytes32`, rendered `0x`-prefixed on the wire
//!
//! Every conversion between the two goes through this module.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::OwnerId;
use crate::infra::{ProofError, Result};

/// 32-byte SHA-256 hash
pub type Hash256 = [u8; 32];

/// Length of a storage-form hash in hex characters
pub const HASH_HEX_LEN: usize = 64;

/// Longest prefix of a rejected hash kept in errors and logs
pub const HASH_PREVIEW_CHARS: usize = 80;

/// Domain prefix for proof hash derivation
pub const DOMAIN_PROOF: &[u8] = b"PROOFMARK_PROOF_V1";

/// Canonical storage-form proof hash.
///
/// Can only be built through [`to_storage_form`] (or the equivalent
/// `parse`/`FromStr`/deserialize paths), so holding one means the value is
/// valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProofHash(String);

impl ProofHash {
    /// Canonicalize a raw hash (see [`to_storage_form`])
    pub fn parse(raw: &str) -> Result<Self> {
        to_storage_form(raw)
    }

    pub fn from_bytes(bytes: Hash256) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `bytes32` form for contract calls
    pub fn to_chain_form(&self) -> B256 {
        let mut bytes = [0u8; 32];
        // Holds by construction: 64 lower-case hex characters
        hex::decode_to_slice(&self.0, &mut bytes).unwrap_or_default();
        B256::from(bytes)
    }
}

impl fmt::Display for ProofHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProofHash {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        to_storage_form(s)
    }
}

impl TryFrom<String> for ProofHash {
    type Error = ProofError;

    fn try_from(value: String) -> Result<Self> {
        to_storage_form(&value)
    }
}

impl From<ProofHash> for String {
    fn from(hash: ProofHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ProofHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Bounded prefix of untrusted hash input
pub fn hash_preview(raw: &str) -> &str {
    match raw.char_indices().nth(HASH_PREVIEW_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

fn invalid_hash(raw: &str) -> ProofError {
    let preview = hash_preview(raw);
    if preview.len() < raw.len() {
        ProofError::InvalidHash(format!("{preview}..."))
    } else {
        ProofError::InvalidHash(raw.to_string())
    }
}

/// Strip an optional `0x` prefix, lower-case, and require exactly 64 hex
/// characters.
pub fn to_storage_form(raw: &str) -> Result<ProofHash> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    if body.len() != HASH_HEX_LEN || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid_hash(raw));
    }
    Ok(ProofHash(body.to_ascii_lowercase()))
}

/// Convert a storage-form hash to its `bytes32` chain form.
///
/// Unlike [`to_storage_form`] this does not normalize: the input must already
/// be bare lower-case hex of the right length.
pub fn to_chain_form(storage_hash: &str) -> Result<B256> {
    let well_formed = storage_hash.len() == HASH_HEX_LEN
        && storage_hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err(invalid_hash(storage_hash));
    }

    let mut bytes = [0u8; 32];
    hex::decode_to_slice(storage_hash, &mut bytes)
        .map_err(|_| invalid_hash(storage_hash))?;
    Ok(B256::from(bytes))
}

/// Storage form of a `bytes32` value read from the chain
pub fn from_chain_form(chain_hash: &B256) -> ProofHash {
    ProofHash(hex::encode(chain_hash.as_slice()))
}

/// Wire rendering of a chain-form hash: `0x` + 64 lower-case hex characters
pub fn chain_form_hex(chain_hash: &B256) -> String {
    format!("0x{}", hex::encode(chain_hash.as_slice()))
}

/// Encode a string as length-prefixed UTF-8 bytes
/// Format: U32_BE(len) || UTF8_bytes
pub fn encode_string(s: &str) -> Vec<u8> {
    let utf8_bytes = s.as_bytes();
    let mut result = Vec::with_capacity(4 + utf8_bytes.len());
    result.extend_from_slice(&(utf8_bytes.len() as u32).to_be_bytes());
    result.extend_from_slice(utf8_bytes);
    result
}

/// Derive the proof hash for a piece of generated content.
///
/// proof_hash = SHA256(b"PROOFMARK_PROOF_V1" || STR(owner) || STR(prompt)
///                     || STR(content) || I64_BE(generated_at_millis))
pub fn compute_proof_hash(
    owner_id: &OwnerId,
    prompt: &str,
    content: &str,
    generated_at: DateTime<Utc>,
) -> ProofHash {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_PROOF);
    hasher.update(encode_string(&owner_id.to_string()));
    hasher.update(encode_string(prompt));
    hasher.update(encode_string(content));
    hasher.update(generated_at.timestamp_millis().to_be_bytes());
    ProofHash::from_bytes(hasher.finalize().into())
}
