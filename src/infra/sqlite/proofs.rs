//! SQLite proof store
//!
//! Backs the `proofs` table. Timestamps are RFC 3339 text with fixed
//! microsecond precision so that text ordering equals time ordering.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{sqlite::SqlitePool, FromRow};
use tracing::debug;
use uuid::Uuid;

use crate::crypto::{chain_form_hex, to_storage_form, ProofHash};
use crate::domain::{NewProof, OwnerId, ProofId, ProofRecord, ProofStatus, StatusUpdate};
use crate::infra::{ProofStore, StoreError, StoreResult};

/// SQLite-based proof store
#[derive(Debug, Clone)]
pub struct SqliteProofStore {
    pool: SqlitePool,
}

impl SqliteProofStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new store from a database URL or path
    pub async fn from_path(path: &str) -> StoreResult<Self> {
        let pool = SqlitePool::connect(path).await?;
        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn initialize(&self) -> StoreResult<()> {
        crate::migrations::run_sqlite(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl ProofStore for SqliteProofStore {
    async fn insert(&self, proof: NewProof) -> StoreResult<ProofRecord> {
        let mut record = ProofRecord::from_new(ProofId::new(), proof);
        // Stored precision; keeps the returned record equal to what a read yields
        record.created_at = record.created_at.trunc_subsecs(6);

        sqlx::query(
            r#"
            INSERT INTO proofs (
                id, owner_id, prompt, content_snippet,
                hash, tx_hash, status, created_at
            ) VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.owner_id.to_string())
        .bind(&record.prompt)
        .bind(&record.content_snippet)
        .bind(record.hash.as_str())
        .bind(record.status.as_str())
        .bind(timestamp(&record.created_at))
        .execute(&self.pool)
        .await?;

        debug!(id = %record.id, hash = %record.hash, "inserted pending proof");
        Ok(record)
    }

    async fn list_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ProofRecord>> {
        let rows = sqlx::query_as::<_, ProofRow>(
            r#"
            SELECT id, owner_id, prompt, content_snippet,
                   hash, tx_hash, status, created_at
            FROM proofs
            WHERE owner_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProofRecord::try_from).collect()
    }

    async fn find_by_hash(&self, hash: &ProofHash) -> StoreResult<Option<ProofRecord>> {
        let row = sqlx::query_as::<_, ProofRow>(
            r#"
            SELECT id, owner_id, prompt, content_snippet,
                   hash, tx_hash, status, created_at
            FROM proofs
            WHERE hash = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProofRecord::try_from).transpose()
    }

    async fn update_status(&self, hash: &ProofHash, update: StatusUpdate) -> StoreResult<u64> {
        let tx_hash = update.tx_hash.as_ref().map(chain_form_hex);

        let result = sqlx::query(
            "UPDATE proofs SET status = ?, tx_hash = COALESCE(?, tx_hash) WHERE hash = ?",
        )
        .bind(update.status.as_str())
        .bind(tx_hash)
        .bind(hash.as_str())
        .execute(&self.pool)
        .await?;

        match result.rows_affected() {
            0 => Err(StoreError::NoMatchingRows(hash.to_string())),
            n => {
                debug!(hash = %hash, status = %update.status, rows = n, "updated proof status");
                Ok(n)
            }
        }
    }
}

/// Raw row from the proofs table
#[derive(Debug, FromRow)]
struct ProofRow {
    id: String,
    owner_id: String,
    prompt: String,
    content_snippet: String,
    hash: String,
    tx_hash: Option<String>,
    status: String,
    created_at: String,
}

impl TryFrom<ProofRow> for ProofRecord {
    type Error = StoreError;

    fn try_from(row: ProofRow) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("invalid id: {e}")))?;

        let owner_id = Uuid::parse_str(&row.owner_id)
            .map_err(|e| corrupt(format!("invalid owner_id: {e}")))?;

        let hash = to_storage_form(&row.hash).map_err(|e| corrupt(e.to_string()))?;

        let tx_hash = row
            .tx_hash
            .as_deref()
            .map(str::parse::<TxHash>)
            .transpose()
            .map_err(|e| corrupt(format!("invalid tx_hash: {e}")))?;

        let status: ProofStatus = row.status.parse().map_err(corrupt)?;

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| corrupt(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(ProofRecord {
            id: ProofId::from_uuid(id),
            owner_id: OwnerId::from_uuid(owner_id),
            prompt: row.prompt,
            content_snippet: row.content_snippet,
            hash,
            tx_hash,
            status,
            created_at,
        })
    }
}
