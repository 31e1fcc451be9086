//! On-chain view types

use alloy::primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProofStatus;

/// Result of the read-only `verifyProof` call. Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProofState {
    pub exists: bool,
    pub owner: Address,
}

impl ChainProofState {
    /// The zero address means "not registered"
    pub fn from_owner(owner: Address) -> Self {
        Self {
            exists: owner != Address::ZERO,
            owner,
        }
    }

    /// Status implied by this chain state
    pub fn status(&self) -> ProofStatus {
        if self.exists {
            ProofStatus::Verified
        } else {
            ProofStatus::Pending
        }
    }
}

/// Native currency description for add-network requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters the wallet needs to add (and then switch to) a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkParams {
    /// Polygon Amoy testnet
    pub fn polygon_amoy() -> Self {
        Self {
            chain_id: 80002,
            chain_name: "Polygon Amoy Testnet".to_string(),
            native_currency: NativeCurrency {
                name: "POL".to_string(),
                symbol: "POL".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc-amoy.polygon.technology".to_string()],
            block_explorer_urls: vec!["https://amoy.polygonscan.com".to_string()],
        }
    }

    /// EIP-3085 `wallet_addEthereumChain` parameter object
    pub fn to_add_chain_request(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": format!("{:#x}", self.chain_id),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        })
    }
}

/// Contract call or transaction, independent of any provider library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            data: data.into(),
            gas_limit: None,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Three-way status shown to users: stored cache, chain truth and the
/// outcome of an in-flight registration folded into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
    AlreadyRegistered,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
            VerificationStatus::AlreadyRegistered => "already_registered",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_owner_is_unregistered() {
        let state = ChainProofState::from_owner(Address::ZERO);
        assert!(!state.exists);
        assert_eq!(state.status(), ProofStatus::Pending);

        let state = ChainProofState::from_owner(Address::repeat_byte(0x42));
        assert!(state.exists);
        assert_eq!(state.status(), ProofStatus::Verified);
    }

    #[test]
    fn test_add_chain_request_shape() {
        let request = NetworkParams::polygon_amoy().to_add_chain_request();
        assert_eq!(request["chainId"], "0x13882");
        assert_eq!(request["nativeCurrency"]["decimals"], 18);
        assert_eq!(request["rpcUrls"][0], "https://rpc-amoy.polygon.technology");
    }
}
