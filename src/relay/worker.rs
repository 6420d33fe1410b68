//! Relay worker: the only task that touches the payer's account sequence
//!
//! One request at a time:
//! 1. refresh account number/sequence if stale
//! 2. quote the fee
//! 3. build and sign the envelope
//! 4. broadcast (pending-pool admission only)
//! 5. interpret the response and reply to the caller

use super::{RelayRequest, RelayResult};
use crate::chain::{BroadcastOutcome, Broadcaster, LedgerClient};
use crate::error::RelayerError;
use crate::tx::{AccountPhase, AccountState, EnvelopeBuilder, EthereumMessage, FeeEstimator};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Single-writer relay worker
pub struct RelayWorker {
    builder: EnvelopeBuilder,
    estimator: FeeEstimator,
    ledger: Arc<dyn LedgerClient>,
    broadcaster: Arc<dyn Broadcaster>,
    account: AccountState,
    requests: mpsc::Receiver<RelayRequest>,
    shutdown: watch::Receiver<bool>,
}

impl RelayWorker {
    pub fn new(
        builder: EnvelopeBuilder,
        estimator: FeeEstimator,
        ledger: Arc<dyn LedgerClient>,
        broadcaster: Arc<dyn Broadcaster>,
        requests: mpsc::Receiver<RelayRequest>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            builder,
            estimator,
            ledger,
            broadcaster,
            account: AccountState::new(),
            requests,
            shutdown,
        }
    }

    /// Current state of the cached account
    pub fn phase(&self) -> AccountPhase {
        self.account.phase()
    }

    /// Process requests until shutdown or until every handle is dropped.
    ///
    /// Queued requests are not drained on shutdown; their callers observe
    /// the worker as unavailable.
    pub async fn run(mut self) {
        info!(
            payer = self.builder.identity().bech32_address(),
            phase = ?self.phase(),
            "Relay worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let request = tokio::select! {
                biased;

                _ = self.shutdown.changed() => break,

                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            self.handle(request).await;
        }

        info!("Relay worker stopped");
    }

    async fn handle(&mut self, request: RelayRequest) {
        let span = info_span!(
            "relay_request",
            id = %request.id,
            hash = ?request.message.hash()
        );

        async {
            let result = self.relay(&request.message, &request.fee_denom).await;

            match &result {
                Ok(_) => debug!("Relayed"),
                Err(e) if e.is_sequence_mismatch() => {
                    info!(phase = ?self.phase(), "Relay failed on stale sequence: {}", e)
                }
                Err(e) => warn!(kind = e.kind(), "Relay failed: {}", e),
            }
            crate::metrics::record_relay_latency(request.enqueued_at.elapsed().as_secs_f64());

            if !request.reply(result) {
                debug!("Caller stopped waiting for reply");
            }
        }
        .instrument(span)
        .await
    }

    async fn relay(&mut self, message: &EthereumMessage, fee_denom: &str) -> RelayResult {
        let payer = self.builder.identity().bech32_address();
        if self.account.phase() == AccountPhase::NeedsAccountRefresh {
            debug!(payer, "Refreshing fee payer account");
        }

        let (account_number, sequence) = match self
            .account
            .ensure_fresh(self.ledger.as_ref(), payer)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                crate::metrics::record_relay_outcome(e.kind());
                return Err(e);
            }
        };

        let result = self
            .submit(message, fee_denom, account_number, sequence)
            .await;

        let outcome = match &result {
            Ok(BroadcastOutcome::DuplicatePending) => "duplicate",
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        crate::metrics::record_relay_outcome(outcome);

        result.map(|_| message.hash())
    }

    /// Quote, build, broadcast and apply the response to the cached account
    async fn submit(
        &mut self,
        message: &EthereumMessage,
        fee_denom: &str,
        account_number: u64,
        sequence: u64,
    ) -> Result<BroadcastOutcome, RelayerError> {
        let quote = self
            .estimator
            .estimate(message.gas_limit(), fee_denom)
            .await?;

        let envelope = self
            .builder
            .build(message, &quote, account_number, sequence)?;

        debug!(
            sequence = envelope.sequence,
            envelope = %envelope.envelope_hash,
            fee = %quote.amount,
            "Broadcasting envelope"
        );

        // Unreachable node: sequence untouched
        let response = self.broadcaster.broadcast_sync(envelope.tx_bytes).await?;

        let outcome = response.outcome();
        match outcome {
            BroadcastOutcome::Accepted => {
                self.account.advance();
            }
            BroadcastOutcome::DuplicatePending => {
                info!(sequence, "Envelope already pending, treating as accepted");
                self.account.advance();
            }
            BroadcastOutcome::SequenceMismatch => {
                warn!(sequence, "Sequence mismatch, account will be refreshed");
                self.account.invalidate();
                return Err(RelayerError::SequenceMismatch {
                    code: response.code,
                    codespace: response.codespace,
                    raw_log: response.raw_log,
                });
            }
            BroadcastOutcome::Rejected => {
                return Err(RelayerError::Rejected {
                    code: response.code,
                    codespace: response.codespace,
                    raw_log: response.raw_log,
                });
            }
        }

        Ok(outcome)
    }
}

/// Signal shutdown and wait up to `grace` for the worker to finish its
/// current request. A worker stuck in an outbound call is aborted.
///
/// Returns `true` if the worker exited on its own.
pub async fn stop(
    shutdown: &watch::Sender<bool>,
    mut handle: JoinHandle<()>,
    grace: Duration,
) -> bool {
    let _ = shutdown.send(true);

    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Relay worker terminated abnormally: {}", e);
            false
        }
        Err(_) => {
            warn!("Relay worker did not stop within {:?}, aborting", grace);
            handle.abort();
            false
        }
    }
}
