//! Off-chain proof records
//!
//! A [`ProofRecord`] is one registration attempt. Its `status` is a cache of
//! on-chain truth at the last reconciliation, never the authority.

use alloy::primitives::TxHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{OwnerId, ProofId};
use crate::crypto::ProofHash;
use crate::infra::{ProofError, Result};

/// Minimum prompt length in characters
pub const PROMPT_MIN_CHARS: usize = 10;

/// Maximum prompt length in characters
pub const PROMPT_MAX_CHARS: usize = 5000;

/// Maximum stored content snippet length in characters
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Validated generation prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Accepts 10..=5000 characters (Unicode scalar values, not bytes)
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let chars = text.chars().count();
        if !(PROMPT_MIN_CHARS..=PROMPT_MAX_CHARS).contains(&chars) {
            return Err(ProofError::InvalidPrompt { chars });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Display-only prefix of generated content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContentSnippet(String);

impl ContentSnippet {
    pub fn from_content(content: &str) -> Self {
        Self(content.chars().take(SNIPPET_MAX_CHARS).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Persisted proof status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Verified,
    Failed,
}

impl ProofStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStatus::Pending => "pending",
            ProofStatus::Verified => "verified",
            ProofStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProofStatus::Pending),
            "verified" => Ok(ProofStatus::Verified),
            "failed" => Ok(ProofStatus::Failed),
            other => Err(format!("unknown proof status: {other}")),
        }
    }
}

/// Input for creating a proof record. Always stored as `pending`.
#[derive(Debug, Clone)]
pub struct NewProof {
    pub owner_id: OwnerId,
    pub prompt: Prompt,
    pub content_snippet: ContentSnippet,
    pub hash: ProofHash,
    pub created_at: DateTime<Utc>,
}

impl NewProof {
    pub fn new(owner_id: OwnerId, prompt: Prompt, content: &str, hash: ProofHash) -> Self {
        Self {
            owner_id,
            prompt,
            content_snippet: ContentSnippet::from_content(content),
            hash,
            created_at: Utc::now(),
        }
    }

    /// Override the generation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One stored registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub id: ProofId,
    pub owner_id: OwnerId,
    pub prompt: String,
    pub content_snippet: String,
    pub hash: ProofHash,
    pub tx_hash: Option<TxHash>,
    pub status: ProofStatus,
    pub created_at: DateTime<Utc>,
}

impl ProofRecord {
    /// Build the stored form of a new proof
    pub fn from_new(id: ProofId, proof: NewProof) -> Self {
        Self {
            id,
            owner_id: proof.owner_id,
            prompt: proof.prompt.into_inner(),
            content_snippet: proof.content_snippet.into_inner(),
            hash: proof.hash,
            tx_hash: None,
            status: ProofStatus::Pending,
            created_at: proof.created_at,
        }
    }

    /// Same record with a different status; every other field is kept
    pub fn with_status(mut self, status: ProofStatus) -> Self {
        self.status = status;
        self
    }

    /// Apply a partial status update
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        if let Some(tx_hash) = update.tx_hash {
            self.tx_hash = Some(tx_hash);
        }
    }
}

/// Partial update written back to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: ProofStatus,
    /// Left untouched when `None`
    pub tx_hash: Option<TxHash>,
}

impl StatusUpdate {
    pub fn verified(tx_hash: TxHash) -> Self {
        Self {
            status: ProofStatus::Verified,
            tx_hash: Some(tx_hash),
        }
    }

    pub fn status_only(status: ProofStatus) -> Self {
        Self {
            status,
            tx_hash: None,
        }
    }
}
