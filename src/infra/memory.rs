//! In-memory proof store
//!
//! Thread-safe, process-local implementation of [`ProofStore`] for tests and
//! dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::crypto::ProofHash;
use crate::domain::{NewProof, OwnerId, ProofId, ProofRecord, StatusUpdate};

use super::{ProofStore, StoreError, StoreResult};

/// In-memory store; rows are kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryProofStore {
    rows: Arc<RwLock<Vec<ProofRecord>>>,
}

impl InMemoryProofStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Copy of every stored row
    pub async fn snapshot(&self) -> Vec<ProofRecord> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl ProofStore for InMemoryProofStore {
    async fn insert(&self, proof: NewProof) -> StoreResult<ProofRecord> {
        let record = ProofRecord::from_new(ProofId::new(), proof);
        self.rows.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ProofRecord>> {
        let rows = self.rows.read().await;
        let mut owned: Vec<ProofRecord> = rows
            .iter()
            .filter(|r| &r.owner_id == owner_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps; reverse
        // first so the later insert wins ties, matching the SQLite store.
        owned.reverse();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn find_by_hash(&self, hash: &ProofHash) -> StoreResult<Option<ProofRecord>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| &r.hash == hash)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn update_status(&self, hash: &ProofHash, update: StatusUpdate) -> StoreResult<u64> {
        let mut rows = self.rows.write().await;
        let mut touched = 0u64;
        for row in rows.iter_mut().filter(|r| &r.hash == hash) {
            row.apply(&update);
            touched += 1;
        }
        if touched == 0 {
            return Err(StoreError::NoMatchingRows(hash.to_string()));
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProofStatus, Prompt};
    use alloy::primitives::TxHash;
    use chrono::{Duration, Utc};

    fn new_proof(owner: &OwnerId, hash_byte: u8, age_secs: i64) -> NewProof {
        let hash = ProofHash::from_bytes([hash_byte; 32]);
        NewProof::new(
            owner.clone(),
            Prompt::new("Write a poem about blockchains").unwrap(),
            "Immutable chains of trust...",
            hash,
        )
        .with_created_at(Utc::now() - Duration::seconds(age_secs))
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let store = InMemoryProofStore::new();
        let owner = OwnerId::new();
        let other = OwnerId::new();

        store.insert(new_proof(&owner, 1, 30)).await.unwrap();
        store.insert(new_proof(&owner, 2, 10)).await.unwrap();
        store.insert(new_proof(&other, 3, 0)).await.unwrap();

        let listed = store.list_by_owner(&owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].hash, ProofHash::from_bytes([2; 32]));
        assert!(listed.iter().all(|r| r.status == ProofStatus::Pending));
    }

    #[tokio::test]
    async fn test_update_status_touches_all_rows_with_hash() {
        let store = InMemoryProofStore::new();
        let owner = OwnerId::new();
        store.insert(new_proof(&owner, 7, 20)).await.unwrap();
        store.insert(new_proof(&owner, 7, 10)).await.unwrap();

        let hash = ProofHash::from_bytes([7; 32]);
        let tx = TxHash::repeat_byte(0xaa);
        let touched = store
            .update_status(&hash, StatusUpdate::verified(tx))
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let found = store.find_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.status, ProofStatus::Verified);
        assert_eq!(found.tx_hash, Some(tx));
    }

    #[tokio::test]
    async fn test_update_status_unknown_hash_errors() {
        let store = InMemoryProofStore::new();
        let result = store
            .update_status(
                &ProofHash::from_bytes([9; 32]),
                StatusUpdate::status_only(ProofStatus::Failed),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NoMatchingRows(_))));
    }
}
