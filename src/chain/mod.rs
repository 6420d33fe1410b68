//! Chain module - the relay's view of the ledger node
//!
//! This module provides:
//! - The query surface the fee estimator and account refresh depend on
//! - The broadcast surface the relay worker submits envelopes through
//! - Classification of node response codes
//! - A CometBFT JSON-RPC provider implementing both

pub mod provider;

pub use provider::RpcProvider;

use crate::error::RelayerResult;

use async_trait::async_trait;
use num_bigint::BigUint;

#[cfg(test)]
use mockall::automock;

/// Codespace of the SDK's core errors
pub const SDK_CODESPACE: &str = "sdk";
/// Exact transaction bytes are already in the node's pending pool
pub const CODE_TX_IN_MEMPOOL_CACHE: u32 = 19;
/// Node's pending pool refused the transaction for capacity
pub const CODE_MEMPOOL_IS_FULL: u32 = 20;
/// Transaction bytes exceed the node's size limit
pub const CODE_TX_TOO_LARGE: u32 = 21;
/// Signer sequence does not match the account's
pub const CODE_WRONG_SEQUENCE: u32 = 32;

/// Block result header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockResults {
    pub height: u64,
}

/// Fee-market module parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeMarketParams {
    pub base_fee_change_denominator: u32,
}

/// On-chain account number and sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Response of a synchronous broadcast (pending-pool admission only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub code: u32,
    pub codespace: String,
    pub raw_log: String,
    pub hash: String,
}

/// How the relay interprets a broadcast response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted,
    DuplicatePending,
    SequenceMismatch,
    Rejected,
}

impl BroadcastResponse {
    /// Response with code 0
    #[cfg(test)]
    pub fn accepted(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            ..Default::default()
        }
    }

    /// Response carrying an SDK error code
    pub fn sdk_error(code: u32, raw_log: impl Into<String>) -> Self {
        Self {
            code,
            codespace: SDK_CODESPACE.to_string(),
            raw_log: raw_log.into(),
            hash: String::new(),
        }
    }

    pub fn outcome(&self) -> BroadcastOutcome {
        if self.code == 0 {
            return BroadcastOutcome::Accepted;
        }

        // Some nodes leave the codespace empty for core errors
        let core = self.codespace.is_empty() || self.codespace == SDK_CODESPACE;
        match self.code {
            CODE_TX_IN_MEMPOOL_CACHE if core => BroadcastOutcome::DuplicatePending,
            CODE_WRONG_SEQUENCE if core => BroadcastOutcome::SequenceMismatch,
            _ => BroadcastOutcome::Rejected,
        }
    }
}

/// Read-only ledger queries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Block results at `height`, or the latest block when `None`
    async fn block_results(&self, height: Option<u64>) -> RelayerResult<BlockResults>;

    /// Base fee at `height`; `None` when the fee market reports none
    async fn base_fee(&self, height: u64) -> RelayerResult<Option<BigUint>>;

    async fn fee_market_params(&self) -> RelayerResult<FeeMarketParams>;

    async fn account_number_sequence(&self, address: &str) -> RelayerResult<AccountInfo>;
}

/// Submission of signed envelope bytes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Returns once the node has admitted or refused the bytes into its
    /// pending pool. Errors mean the node could not be reached.
    async fn broadcast_sync(&self, tx_bytes: Vec<u8>) -> RelayerResult<BroadcastResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            BroadcastResponse::accepted("AB").outcome(),
            BroadcastOutcome::Accepted
        );
        assert_eq!(
            BroadcastResponse::sdk_error(CODE_TX_IN_MEMPOOL_CACHE, "tx already exists in cache")
                .outcome(),
            BroadcastOutcome::DuplicatePending
        );
        assert_eq!(
            BroadcastResponse::sdk_error(CODE_WRONG_SEQUENCE, "account sequence mismatch")
                .outcome(),
            BroadcastOutcome::SequenceMismatch
        );
        assert_eq!(
            BroadcastResponse::sdk_error(5, "insufficient funds").outcome(),
            BroadcastOutcome::Rejected
        );
    }

    #[test]
    fn test_codes_from_other_codespaces_are_rejections() {
        let resp = BroadcastResponse {
            code: CODE_WRONG_SEQUENCE,
            codespace: "evm".to_string(),
            raw_log: "module error".to_string(),
            hash: String::new(),
        };
        assert_eq!(resp.outcome(), BroadcastOutcome::Rejected);

        let resp = BroadcastResponse {
            code: CODE_TX_IN_MEMPOOL_CACHE,
            codespace: String::new(),
            raw_log: String::new(),
            hash: String::new(),
        };
        assert_eq!(resp.outcome(), BroadcastOutcome::DuplicatePending);
    }
}
