//! Fee estimation against the ledger's base-fee market
//!
//! The quote must survive the blocks between estimation and inclusion, so
//! by default the base fee is projected to its worst case after a fixed
//! lookahead. Each block can raise the base fee by at most `1/d` of its
//! value, where `d` is the fee market's change denominator, giving
//!
//! ```text
//! projected = base_fee * (d + 1)^L / d^L
//! ```
//!
//! All arithmetic is exact; the ledger compares fees as integers.

use crate::chain::LedgerClient;
use crate::config::FeePolicy;
use crate::error::{RelayerError, RelayerResult};

use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::Arc;
use tracing::debug;

/// Fee amount attached to one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeQuote {
    pub amount: BigUint,
    pub denom: String,
}

impl FeeQuote {
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

/// Fee estimator for relayed envelopes
pub struct FeeEstimator {
    client: Arc<dyn LedgerClient>,
    /// Blocks of base-fee growth the quote must cover
    lookahead_blocks: u32,
    policy: FeePolicy,
}

impl FeeEstimator {
    /// Create a new fee estimator
    pub fn new(client: Arc<dyn LedgerClient>, lookahead_blocks: u32, policy: FeePolicy) -> Self {
        Self {
            client,
            lookahead_blocks,
            policy,
        }
    }

    /// Minimum fee for `gas_limit` units, in `denom`
    pub async fn estimate(&self, gas_limit: u64, denom: &str) -> RelayerResult<FeeQuote> {
        let block = self.client.block_results(None).await?;

        let base_fee = self
            .client
            .base_fee(block.height)
            .await?
            .ok_or_else(|| RelayerError::Query {
                query: "base_fee",
                message: format!("no base fee at height {}", block.height),
            })?;

        if base_fee.is_zero() {
            return Ok(FeeQuote {
                amount: BigUint::zero(),
                denom: denom.to_string(),
            });
        }

        let price = match self.policy {
            FeePolicy::Lookahead => {
                let params = self.client.fee_market_params().await?;
                project_base_fee(
                    &base_fee,
                    params.base_fee_change_denominator,
                    self.lookahead_blocks,
                )?
            }
            FeePolicy::CurrentBaseFee => base_fee.clone(),
        };

        let amount = &price * BigUint::from(gas_limit);

        debug!(
            height = block.height,
            %base_fee,
            %price,
            gas_limit,
            %amount,
            "Fee quote computed"
        );
        crate::metrics::record_fee_quote(&price);

        Ok(FeeQuote {
            amount,
            denom: denom.to_string(),
        })
    }
}

/// Worst-case base fee after `lookahead` blocks, floored at `lookahead`
pub fn project_base_fee(
    base_fee: &BigUint,
    denominator: u32,
    lookahead: u32,
) -> RelayerResult<BigUint> {
    if denominator == 0 {
        return Err(RelayerError::Query {
            query: "fee_market_params",
            message: "base fee change denominator is zero".to_string(),
        });
    }

    let d = BigUint::from(denominator);
    let numerator = (d.clone() + 1u32).pow(lookahead);
    let divisor = d.pow(lookahead);
    let projected = base_fee * numerator / divisor;

    // Minimum delta of one per block
    Ok(projected.max(BigUint::from(lookahead)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlockResults, FeeMarketParams, MockLedgerClient};
    use mockall::predicate::eq;

    fn ledger(base_fee: Option<u64>, denominator: u32) -> MockLedgerClient {
        let mut client = MockLedgerClient::new();
        client
            .expect_block_results()
            .with(eq(None))
            .returning(|_| Ok(BlockResults { height: 1 }));
        client
            .expect_base_fee()
            .with(eq(1u64))
            .returning(move |_| Ok(base_fee.map(BigUint::from)));
        client.expect_fee_market_params().returning(move || {
            Ok(FeeMarketParams {
                base_fee_change_denominator: denominator,
            })
        });
        client
    }

    #[test]
    fn test_projection_formula() {
        // 123 * 9^2 / 8^2 = 9963 / 64 = 155 (floor)
        let projected = project_base_fee(&BigUint::from(123u32), 8, 2).unwrap();
        assert_eq!(projected, BigUint::from(155u32));

        // 1_000_000_000 * 51^3 / 50^3 exactly
        let projected = project_base_fee(&BigUint::from(1_000_000_000u64), 50, 3).unwrap();
        assert_eq!(projected, BigUint::from(1_061_208_000u64));
    }

    #[test]
    fn test_projection_floor() {
        let projected = project_base_fee(&BigUint::from(1u32), 8, 2).unwrap();
        assert_eq!(projected, BigUint::from(2u32));
    }

    #[test]
    fn test_projection_rejects_zero_denominator() {
        assert!(project_base_fee(&BigUint::from(1u32), 0, 2).is_err());
    }

    #[test]
    fn test_projection_is_exact_for_large_fees() {
        let base_fee: BigUint = "340282366920938463463374607431768211457".parse().unwrap();
        let projected = project_base_fee(&base_fee, 8, 2).unwrap();
        assert_eq!(projected, base_fee * 81u32 / 64u32);
    }

    #[tokio::test]
    async fn test_estimate_end_to_end_quote() {
        let estimator = FeeEstimator::new(Arc::new(ledger(Some(123), 8)), 2, FeePolicy::Lookahead);

        let quote = estimator.estimate(100_000, "aevmos").await.unwrap();
        assert_eq!(quote.amount, BigUint::from(15_500_000u64));
        assert_eq!(quote.denom, "aevmos");

        // Identical inputs, identical quote
        let again = estimator.estimate(100_000, "aevmos").await.unwrap();
        assert_eq!(again, quote);
    }

    #[tokio::test]
    async fn test_zero_base_fee_skips_params() {
        let mut client = MockLedgerClient::new();
        client
            .expect_block_results()
            .returning(|_| Ok(BlockResults { height: 5 }));
        client
            .expect_base_fee()
            .with(eq(5u64))
            .returning(|_| Ok(Some(BigUint::zero())));
        client.expect_fee_market_params().never();

        let estimator = FeeEstimator::new(Arc::new(client), 2, FeePolicy::Lookahead);
        let quote = estimator.estimate(100_000, "aevmos").await.unwrap();
        assert!(quote.is_zero());
    }

    #[tokio::test]
    async fn test_current_base_fee_policy() {
        let estimator =
            FeeEstimator::new(Arc::new(ledger(Some(123), 8)), 2, FeePolicy::CurrentBaseFee);

        let quote = estimator.estimate(100_000, "aevmos").await.unwrap();
        assert_eq!(quote.amount, BigUint::from(12_300_000u64));
    }

    #[tokio::test]
    async fn test_missing_base_fee_is_query_failure() {
        let estimator = FeeEstimator::new(Arc::new(ledger(None, 8)), 2, FeePolicy::Lookahead);

        let err = estimator.estimate(100_000, "aevmos").await.unwrap_err();
        assert!(matches!(err, RelayerError::Query { query: "base_fee", .. }));
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut client = MockLedgerClient::new();
        client.expect_block_results().returning(|_| {
            Err(RelayerError::Query {
                query: "block_results",
                message: "connection refused".to_string(),
            })
        });
        client.expect_base_fee().never();

        let estimator = FeeEstimator::new(Arc::new(client), 2, FeePolicy::Lookahead);
        tokio_test::assert_err!(estimator.estimate(21_000, "aevmos").await);
    }
}
