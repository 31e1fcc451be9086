//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;

use proofmark::chain::ChainClient;
use proofmark::crypto::compute_proof_hash;
use proofmark::domain::{NetworkParams, NewProof, OwnerId, ProofHash, Prompt, TxReceipt, TxRequest};
use proofmark::infra::{
    Authenticator, ContentGenerator, GeneratedContent, InMemoryProofStore, ProofStore,
    SqliteProofStore, StoreError, StoreResult, WalletError, WalletProvider,
    WalletResult,
};
use proofmark::{ProofRecord, Result, StatusUpdate};

/// Registry address used by every fixture
pub const REGISTRY: Address = Address::repeat_byte(0xcc);

/// Account the scripted wallet exposes
pub const SIGNER: Address = Address::repeat_byte(0x01);

/// Gas the scripted wallet estimates for every call
pub const SCRIPTED_GAS: u64 = 48_000;

/// Amoy chain id
pub const AMOY: u64 = 80002;

/// Test owner ID
pub fn test_owner_id() -> OwnerId {
    "11111111-1111-1111-1111-111111111111".parse().unwrap()
}

/// Deterministic 64-hex storage-form hash
pub fn sample_hash(byte: u8) -> ProofHash {
    ProofHash::from_bytes([byte; 32])
}

/// A pending proof for `owner` with a fixed prompt
pub fn new_proof(owner: &OwnerId, hash: ProofHash) -> NewProof {
    NewProof::new(
        owner.clone(),
        Prompt::new("Write a sonnet about distributed ledgers").unwrap(),
        "Shall I compare thee to a Merkle tree? Thou art more lovely and more immutable.",
        hash,
    )
}

/// SQLite store on a private in-memory database
pub async fn sqlite_store() -> Arc<SqliteProofStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteProofStore::new(pool);
    store.initialize().await.unwrap();
    Arc::new(store)
}

pub fn chain_client(wallet: ScriptedWallet) -> Arc<ChainClient<ScriptedWallet>> {
    Arc::new(ChainClient::new(wallet, REGISTRY, NetworkParams::polygon_amoy()))
}

/// Hash argument of a `registerProof` / `verifyProof` calldata
fn hash_argument(data: &Bytes) -> WalletResult<B256> {
    data.get(4..36)
        .map(B256::from_slice)
        .ok_or_else(|| WalletError::Transport("calldata too short".to_string()))
}

#[derive(Debug)]
struct WalletState {
    chain_id: u64,
    known_chains: HashSet<u64>,
    owners: HashMap<B256, Address>,
    failing_reads: HashSet<B256>,
    deployed: bool,
    reject_switch: bool,
    reject_add: bool,
    reject_send: bool,
    never_confirm: bool,
    sent: u8,
    log: Vec<String>,
}

/// In-process wallet with a scripted chain behind it.
///
/// A sent `registerProof` records the signer as owner immediately, so a
/// transaction whose confirmation was never observed still shows up on the
/// next read.
#[derive(Debug, Clone)]
pub struct ScriptedWallet {
    state: Arc<Mutex<WalletState>>,
}

impl Default for ScriptedWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedWallet {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(WalletState {
                chain_id: AMOY,
                known_chains: HashSet::from([1, AMOY]),
                owners: HashMap::new(),
                failing_reads: HashSet::new(),
                deployed: true,
                reject_switch: false,
                reject_add: false,
                reject_send: false,
                never_confirm: false,
                sent: 0,
                log: Vec::new(),
            })),
        }
    }

    /// Point the wallet at another chain
    pub fn on_chain(self, chain_id: u64) -> Self {
        self.state.lock().unwrap().chain_id = chain_id;
        self
    }

    /// Forget a chain so switching to it needs an add first
    pub fn without_chain(self, chain_id: u64) -> Self {
        self.state.lock().unwrap().known_chains.remove(&chain_id);
        self
    }

    pub fn with_owner(self, hash: &ProofHash, owner: Address) -> Self {
        self.state
            .lock()
            .unwrap()
            .owners
            .insert(hash.to_chain_form(), owner);
        self
    }

    pub fn with_failing_read(self, hash: &ProofHash) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_reads
            .insert(hash.to_chain_form());
        self
    }

    pub fn without_registry(self) -> Self {
        self.state.lock().unwrap().deployed = false;
        self
    }

    pub fn rejecting_switch(self) -> Self {
        self.state.lock().unwrap().reject_switch = true;
        self
    }

    /// Refuse to add any network
    pub fn rejecting_add(self) -> Self {
        self.state.lock().unwrap().reject_add = true;
        self
    }

    pub fn rejecting_send(self) -> Self {
        self.state.lock().unwrap().reject_send = true;
        self
    }

    pub fn never_confirming(self) -> Self {
        self.state.lock().unwrap().never_confirm = true;
        self
    }

    pub fn active_chain(&self) -> u64 {
        self.state.lock().unwrap().chain_id
    }

    pub fn owner_of(&self, hash: &ProofHash) -> Option<Address> {
        self.state
            .lock()
            .unwrap()
            .owners
            .get(&hash.to_chain_form())
            .copied()
    }

    /// Names of wallet methods called, in order
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn called(&self, method: &str) -> usize {
        self.log().iter().filter(|m| m.as_str() == method).count()
    }

    fn record(&self, method: &str) -> std::sync::MutexGuard<'_, WalletState> {
        let mut state = self.state.lock().unwrap();
        state.log.push(method.to_string());
        state
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    async fn active_network(&self) -> WalletResult<u64> {
        Ok(self.record("active_network").chain_id)
    }

    async fn request_accounts(&self) -> WalletResult<Vec<Address>> {
        drop(self.record("request_accounts"));
        Ok(vec![SIGNER])
    }

    async fn switch_network(&self, chain_id: u64) -> WalletResult<()> {
        let mut state = self.record("switch_network");
        if state.reject_switch {
            return Err(WalletError::UserRejected);
        }
        if !state.known_chains.contains(&chain_id) {
            return Err(WalletError::UnrecognizedChain(chain_id));
        }
        state.chain_id = chain_id;
        Ok(())
    }

    async fn add_network(&self, params: &NetworkParams) -> WalletResult<()> {
        let mut state = self.record("add_network");
        if state.reject_add {
            return Err(WalletError::Rpc {
                code: -32602,
                message: "invalid chain parameters".to_string(),
            });
        }
        state.known_chains.insert(params.chain_id);
        Ok(())
    }

    async fn get_code(&self, address: Address) -> WalletResult<Bytes> {
        let state = self.record("get_code");
        if state.deployed && address == REGISTRY {
            Ok(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn call(&self, request: &TxRequest) -> WalletResult<Bytes> {
        let state = self.record("call");
        let hash = hash_argument(&request.data)?;
        if state.failing_reads.contains(&hash) {
            return Err(WalletError::Transport("upstream node timed out".to_string()));
        }
        let owner = state.owners.get(&hash).copied().unwrap_or(Address::ZERO);
        Ok(Bytes::from(owner.into_word().to_vec()))
    }

    async fn estimate_gas(&self, _request: &TxRequest) -> WalletResult<u64> {
        drop(self.record("estimate_gas"));
        Ok(SCRIPTED_GAS)
    }

    async fn send_transaction(&self, request: &TxRequest) -> WalletResult<TxHash> {
        let mut state = self.record("send_transaction");
        if state.reject_send {
            return Err(WalletError::UserRejected);
        }
        let hash = hash_argument(&request.data)?;
        let from = request.from.unwrap_or(SIGNER);
        state.owners.insert(hash, from);
        state.sent += 1;
        Ok(TxHash::repeat_byte(0xa0 + state.sent))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> WalletResult<TxReceipt> {
        let never_confirm = self.record("wait_for_receipt").never_confirm;
        if never_confirm {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(1_000),
            gas_used: SCRIPTED_GAS - 1_000,
            success: true,
        })
    }
}

/// Authenticator with a fixed session
pub struct StaticSession(pub Option<OwnerId>);

#[async_trait]
impl Authenticator for StaticSession {
    async fn current_user(&self) -> Option<OwnerId> {
        self.0.clone()
    }
}

/// Generator that echoes the prompt and derives the hash locally
pub struct EchoGenerator {
    pub owner: OwnerId,
}

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<GeneratedContent> {
        let generated_at = Utc::now();
        let content = format!("On the subject of \"{}\": ...", prompt.as_str());
        let hash = compute_proof_hash(&self.owner, prompt.as_str(), &content, generated_at);
        Ok(GeneratedContent {
            content,
            hash: format!("0x{}", hash.as_str().to_uppercase()),
            generated_at,
        })
    }
}

/// In-memory store whose status updates can be made to fail
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryProofStore,
    pub fail_updates: Arc<Mutex<bool>>,
}

impl FlakyStore {
    pub fn failing_updates() -> Self {
        Self {
            inner: InMemoryProofStore::new(),
            fail_updates: Arc::new(Mutex::new(true)),
        }
    }
}

#[async_trait]
impl ProofStore for FlakyStore {
    async fn insert(&self, proof: NewProof) -> StoreResult<ProofRecord> {
        self.inner.insert(proof).await
    }

    async fn list_by_owner(&self, owner_id: &OwnerId) -> StoreResult<Vec<ProofRecord>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn find_by_hash(&self, hash: &ProofHash) -> StoreResult<Option<ProofRecord>> {
        self.inner.find_by_hash(hash).await
    }

    async fn update_status(&self, hash: &ProofHash, update: StatusUpdate) -> StoreResult<u64> {
        if *self.fail_updates.lock().unwrap() {
            return Err(StoreError::Unavailable("database is locked".to_string()));
        }
        self.inner.update_status(hash, update).await
    }
}
