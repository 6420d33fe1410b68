//! Account sequence tracking for the fee payer
//!
//! Handles:
//! - Lazy load of account number and sequence from the ledger
//! - Increment-on-acceptance sequencing
//! - Forced resync after a sequence mismatch
//!
//! The state is owned by the relay worker alone, so nothing here locks.

use crate::chain::LedgerClient;
use crate::error::RelayerResult;

use tracing::{info, warn};

/// Where the worker stands with respect to the payer's on-chain account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountPhase {
    /// Next request must query the account first
    NeedsAccountRefresh,
    Ready,
}

/// Cached account number and next sequence of the fee payer
#[derive(Debug)]
pub struct AccountState {
    account_number: u64,
    sequence: u64,
    stale: bool,
}

impl AccountState {
    /// Start stale; nothing is known until the first refresh
    pub fn new() -> Self {
        Self {
            account_number: 0,
            sequence: 0,
            stale: true,
        }
    }

    pub fn phase(&self) -> AccountPhase {
        if self.stale {
            AccountPhase::NeedsAccountRefresh
        } else {
            AccountPhase::Ready
        }
    }

    /// `(account_number, sequence)` to sign the next envelope with
    pub fn snapshot(&self) -> Option<(u64, u64)> {
        if self.stale {
            None
        } else {
            Some((self.account_number, self.sequence))
        }
    }

    /// Reload from the ledger if stale. A failed query leaves the state
    /// stale so the next request retries it.
    pub async fn ensure_fresh(
        &mut self,
        client: &dyn LedgerClient,
        address: &str,
    ) -> RelayerResult<(u64, u64)> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }

        let result = client.account_number_sequence(address).await;
        crate::metrics::record_account_refresh(result.is_ok());
        let account = result?;

        if self.account_number != 0 && self.account_number != account.account_number {
            warn!(
                "Account number for {} changed from {} to {}",
                address, self.account_number, account.account_number
            );
        }

        self.account_number = account.account_number;
        self.sequence = account.sequence;
        self.stale = false;
        crate::metrics::record_account_sequence(self.sequence);

        info!(
            account_number = self.account_number,
            account_sequence = self.sequence,
            "Account number and sequence updated"
        );

        Ok((self.account_number, self.sequence))
    }

    /// The envelope signed with the current sequence was admitted
    pub fn advance(&mut self) {
        self.sequence += 1;
        crate::metrics::record_account_sequence(self.sequence);
    }

    /// The node disagrees with the cached sequence
    pub fn invalidate(&mut self) {
        self.stale = true;
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}
