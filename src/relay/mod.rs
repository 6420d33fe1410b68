//! Relay request queue and the single-writer worker behind it
//!
//! Any number of callers hold a [`FeePayer`] handle and enqueue requests;
//! exactly one [`RelayWorker`] drains the queue, so the payer's sequence is
//! only ever touched from one task.

pub mod worker;

pub use worker::{stop, RelayWorker};

use crate::error::{RelayerError, RelayerResult};
use crate::tx::EthereumMessage;

use ethers::types::H256;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Outcome delivered to the caller: the EVM transaction hash, or why the
/// message was not submitted
pub type RelayResult = RelayerResult<H256>;

/// One caller submission, consumed exactly once by the worker
#[derive(Debug)]
pub struct RelayRequest {
    pub id: Uuid,
    pub message: EthereumMessage,
    pub fee_denom: String,
    pub enqueued_at: Instant,
    reply: oneshot::Sender<RelayResult>,
}

impl RelayRequest {
    /// Deliver the result. A caller that stopped waiting is not an error.
    pub fn reply(self, result: RelayResult) -> bool {
        self.reply.send(result).is_ok()
    }
}

/// Pending reply for one submission
#[derive(Debug)]
pub struct RelayReceipt {
    id: Uuid,
    rx: oneshot::Receiver<RelayResult>,
}

impl RelayReceipt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the worker's reply. Resolves to `WorkerUnavailable` if the
    /// worker stopped before answering.
    pub async fn wait(self) -> RelayResult {
        self.rx.await.map_err(|_| RelayerError::WorkerUnavailable)?
    }

    /// Wait at most `timeout`; `None` means no reply arrived in time
    pub async fn wait_timeout(self, timeout: Duration) -> Option<RelayResult> {
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }
}

/// Cloneable submission handle for the relay worker
#[derive(Debug, Clone)]
pub struct FeePayer {
    sender: mpsc::Sender<RelayRequest>,
}

/// Create the bounded request queue
pub fn channel(capacity: usize) -> (FeePayer, mpsc::Receiver<RelayRequest>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (FeePayer { sender }, receiver)
}

impl FeePayer {
    /// Enqueue a message. Waits for queue space when the queue is full
    /// rather than dropping the request.
    pub async fn submit(
        &self,
        message: EthereumMessage,
        fee_denom: impl Into<String>,
    ) -> RelayerResult<RelayReceipt> {
        let (reply, rx) = oneshot::channel();
        let id = Uuid::new_v4();

        self.sender
            .send(RelayRequest {
                id,
                message,
                fee_denom: fee_denom.into(),
                enqueued_at: Instant::now(),
                reply,
            })
            .await
            .map_err(|_| RelayerError::WorkerUnavailable)?;

        Ok(RelayReceipt { id, rx })
    }

    /// Requests waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::message::test_utils::message;

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let (fee_payer, mut requests) = channel(4);

        let receipt = fee_payer.submit(message(1), "aevmos").await.unwrap();
        assert_eq!(fee_payer.queued(), 1);

        let request = requests.recv().await.unwrap();
        assert_eq!(request.id, receipt.id());
        assert_eq!(request.fee_denom, "aevmos");

        let hash = request.message.hash();
        assert!(request.reply(Ok(hash)));
        assert_eq!(receipt.wait().await.unwrap(), hash);
    }

    #[tokio::test]
    async fn test_dropped_request_reports_unavailable() {
        let (fee_payer, mut requests) = channel(4);

        let receipt = fee_payer.submit(message(1), "aevmos").await.unwrap();
        drop(requests.recv().await.unwrap());

        assert!(matches!(
            receipt.wait().await,
            Err(RelayerError::WorkerUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_submit_after_worker_gone() {
        let (fee_payer, requests) = channel(4);
        drop(requests);

        assert!(fee_payer.is_closed());
        assert!(matches!(
            fee_payer.submit(message(1), "aevmos").await,
            Err(RelayerError::WorkerUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let (fee_payer, mut requests) = channel(1);
        let _first = fee_payer.submit(message(1), "aevmos").await.unwrap();

        let blocked = fee_payer.submit(message(2), "aevmos");
        tokio::pin!(blocked);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut blocked)
                .await
                .is_err()
        );

        requests.recv().await.unwrap();
        assert!(blocked.await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_timeout_without_reply() {
        let (fee_payer, _requests) = channel(4);
        let receipt = fee_payer.submit(message(1), "aevmos").await.unwrap();

        assert!(receipt
            .wait_timeout(Duration::from_millis(20))
            .await
            .is_none());
    }
}
