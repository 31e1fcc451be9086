//! Reconciliation engine
//!
//! Re-derives each record's status from live chain state. The stored
//! status is a cache; the chain read decides:
//!
//! - non-zero owner → `verified`
//! - zero owner → `pending`
//! - read error → `failed` (that record only)
//!
//! A wallet on the wrong network is not an error. Records keep their stored
//! status and the report carries an advisory that the chain was not consulted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::chain::ChainClient;
use crate::crypto::{to_storage_form, ProofHash};
use crate::domain::{ChainProofState, OwnerId, ProofRecord, ProofStatus, StatusUpdate};
use crate::infra::{ProofError, ProofStore, Result, WalletProvider};

/// Engine settings
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Persist derived statuses that differ from the stored one
    pub write_back: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { write_back: true }
    }
}

/// Why on-chain confirmation was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    NetworkMismatch { expected: u64, actual: u64 },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::NetworkMismatch { expected, actual } => write!(
                f,
                "wallet is on chain {actual}, expected {expected}; on-chain confirmation skipped"
            ),
        }
    }
}

/// What the chain said about one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCheck {
    Observed(ChainProofState),
    Failed(String),
    Skipped(Advisory),
}

/// One record after reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledProof {
    /// The stored record with the derived status applied; other fields untouched
    pub record: ProofRecord,
    /// Status as it was in the store before this pass
    pub stored_status: ProofStatus,
    pub chain: ChainCheck,
    /// Set when persisting a changed status failed
    pub write_back_warning: Option<String>,
}

impl ReconciledProof {
    pub fn status(&self) -> ProofStatus {
        self.record.status
    }

    pub fn changed(&self) -> bool {
        self.record.status != self.stored_status
    }
}

/// Result of a batch pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub proofs: Vec<ReconciledProof>,
    pub advisory: Option<Advisory>,
}

impl ReconcileReport {
    pub fn count(&self, status: ProofStatus) -> usize {
        self.proofs.iter().filter(|p| p.status() == status).count()
    }
}

/// How the chain can be consulted for this pass
enum Preflight {
    Ready,
    Skip(Advisory),
    Unreachable(String),
}

/// Status derivation from the chain read alone
fn derive_status(check: &ChainCheck, stored: ProofStatus) -> ProofStatus {
    match check {
        ChainCheck::Observed(state) => state.status(),
        ChainCheck::Failed(_) => ProofStatus::Failed,
        ChainCheck::Skipped(_) => stored,
    }
}

pub struct ReconciliationEngine<W, S> {
    chain: Arc<ChainClient<W>>,
    store: Arc<S>,
    options: ReconcileOptions,
}

impl<W, S> ReconciliationEngine<W, S>
where
    W: WalletProvider,
    S: ProofStore,
{
    pub fn new(chain: Arc<ChainClient<W>>, store: Arc<S>, options: ReconcileOptions) -> Self {
        Self {
            chain,
            store,
            options,
        }
    }

    /// Reconcile every stored record for `owner_id`, newest first.
    ///
    /// Records are read one at a time. A failed read marks that record
    /// `failed` and the pass continues.
    #[instrument(skip(self, owner_id), fields(owner = %owner_id))]
    pub async fn reconcile_all(&self, owner_id: &OwnerId) -> Result<ReconcileReport> {
        let records = self.store.list_by_owner(owner_id).await?;
        if records.is_empty() {
            debug!(owner = %owner_id, "no proofs to reconcile");
            return Ok(ReconcileReport::default());
        }

        let preflight = self.preflight().await?;
        let advisory = match &preflight {
            Preflight::Skip(advisory) => Some(advisory.clone()),
            _ => None,
        };

        let mut proofs = Vec::with_capacity(records.len());
        for record in records {
            proofs.push(self.reconcile_record(record, &preflight).await);
        }

        let report = ReconcileReport { proofs, advisory };
        info!(
            owner = %owner_id,
            total = report.proofs.len(),
            verified = report.count(ProofStatus::Verified),
            pending = report.count(ProofStatus::Pending),
            failed = report.count(ProofStatus::Failed),
            skipped = report.advisory.is_some(),
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Reconcile the record for a searched hash.
    ///
    /// The chain is never consulted without an off-chain match.
    #[instrument(skip_all)]
    pub async fn reconcile_one(&self, raw_hash: &str) -> Result<ReconciledProof> {
        let hash = to_storage_form(raw_hash)?;
        let record = self
            .store
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| ProofError::ProofNotFound(hash.to_string()))?;

        let preflight = self.preflight().await?;
        Ok(self.reconcile_record(record, &preflight).await)
    }

    /// Network and contract checks shared by every record of a pass.
    ///
    /// Never prompts a network switch. A missing contract is fatal for the call.
    async fn preflight(&self) -> Result<Preflight> {
        let expected = self.chain.expected_chain_id();
        let actual = match self.chain.get_active_network().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not read active network");
                return Ok(Preflight::Unreachable(e.to_string()));
            }
        };

        if actual != expected {
            warn!(expected, actual, "network mismatch, reporting stored statuses");
            return Ok(Preflight::Skip(Advisory::NetworkMismatch { expected, actual }));
        }

        match self.chain.ensure_registry_deployed().await {
            Ok(()) => Ok(Preflight::Ready),
            Err(e @ ProofError::ContractNotDeployed(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "could not read registry code");
                Ok(Preflight::Unreachable(e.to_string()))
            }
        }
    }

    async fn reconcile_record(&self, record: ProofRecord, preflight: &Preflight) -> ReconciledProof {
        let chain = match preflight {
            Preflight::Skip(advisory) => ChainCheck::Skipped(advisory.clone()),
            Preflight::Unreachable(reason) => ChainCheck::Failed(reason.clone()),
            Preflight::Ready => match self.chain.read_proof_state(record.hash.to_chain_form()).await {
                Ok(state) => ChainCheck::Observed(state),
                Err(e) => {
                    warn!(hash = %record.hash, error = %e, "chain read failed");
                    ChainCheck::Failed(e.to_string())
                }
            },
        };

        let stored_status = record.status;
        let derived = derive_status(&chain, stored_status);
        let write_back_warning = if derived != stored_status && self.options.write_back {
            self.write_back(&record.hash, derived).await
        } else {
            None
        };

        debug!(hash = %record.hash, stored = %stored_status, derived = %derived, "reconciled proof");
        ReconciledProof {
            record: record.with_status(derived),
            stored_status,
            chain,
            write_back_warning,
        }
    }

    async fn write_back(&self, hash: &ProofHash, status: ProofStatus) -> Option<String> {
        match self
            .store
            .update_status(hash, StatusUpdate::status_only(status))
            .await
        {
            Ok(_) => None,
            Err(e) => {
                warn!(hash = %hash, status = %status, error = %e, "status write-back failed");
                Some(e.to_string())
            }
        }
    }
}
