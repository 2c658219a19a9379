//! Write path: store content, anchor it, track it until confirmation

use crate::config::{DataAccessConfig, TimeoutConfig};
use crate::error::{DataAccessError, DataAccessResult, ErrorKind};
use crate::metrics::{self, Metrics};
use crate::retry::{RetryError, RetryPolicy};
use crate::traits::{AnchorMetadata, ChainAnchor, ContentStore};
use reqnet_crypto::keccak256;
use reqnet_pending::{PendingEntry, PendingError, PendingStatus, PendingStore};
use reqnet_primitives::{current_timestamp, AnchorTxRef, ChannelId, ContentAddress, Timestamp, Topic, H256};
use reqnet_types::{Envelope, SignedPayload, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transaction to persist and anchor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Channel
    pub channel_id: ChannelId,
    /// Signed payload
    pub payload: SignedPayload,
    /// Topics to index the channel under
    pub topics: Vec<Topic>,
}

/// Acknowledgement of a registered submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    /// Channel
    pub channel_id: ChannelId,
    /// Address of the stored envelope
    pub content_address: ContentAddress,
    /// Keccak-256 of the stored envelope
    pub content_hash: H256,
    /// Anchoring transaction
    pub anchor_tx_ref: AnchorTxRef,
    /// Registration time
    pub submitted_at: Timestamp,
}

impl From<&PendingEntry> for SubmitReceipt {
    fn from(entry: &PendingEntry) -> Self {
        Self {
            channel_id: entry.channel_id,
            content_address: entry.content_address.clone(),
            content_hash: entry.content_hash,
            anchor_tx_ref: entry.anchor_tx_ref,
            submitted_at: entry.submitted_at,
        }
    }
}

/// Submission that was anchored but never confirmed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSubmission {
    /// Receipt returned by the original submit
    pub receipt: SubmitReceipt,
    /// Why the submission was abandoned
    pub reason: String,
}

/// Write half of the data-access layer
pub struct DataAccessWrite {
    content: Arc<dyn ContentStore>,
    anchor: Arc<dyn ChainAnchor>,
    pending: Arc<PendingStore>,
    retry: RetryPolicy,
    timeouts: TimeoutConfig,
    max_age: Duration,
    chain_id: u64,
    metrics: Arc<Metrics>,
}

impl DataAccessWrite {
    /// Create the write path
    pub fn new(
        content: Arc<dyn ContentStore>,
        anchor: Arc<dyn ChainAnchor>,
        pending: Arc<PendingStore>,
        config: &DataAccessConfig,
        chain_id: u64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            content,
            anchor,
            pending,
            retry: RetryPolicy::from_config(&config.retry),
            timeouts: config.timeouts.clone(),
            max_age: config.pending.max_age(),
            chain_id,
            metrics,
        }
    }

    /// Persist, anchor and register a transaction.
    ///
    /// Returns once the entry is registered as pending; confirmation is
    /// observed through reads. Submitting the same payload to the same
    /// channel while it is pending returns the existing receipt. Once the
    /// entry has been promoted or pruned, the same payload is stored and
    /// anchored again; reads keep only the first confirmed anchor of a
    /// content address.
    ///
    /// Pending store limits are checked before the content is stored, so a
    /// full store or channel never leaves an untracked anchor behind.
    pub async fn submit(
        &self,
        request: SubmitRequest,
        cancel: &CancellationToken,
    ) -> DataAccessResult<SubmitReceipt> {
        let channel = request.channel_id;
        let result = crate::timed!(self.metrics, metrics::SUBMIT_LATENCY, {
            self.submit_inner(request, cancel).await
        });
        match &result {
            Ok(_) => self.metrics.counter(metrics::SUBMIT_TOTAL, 1),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Submit failed");
                self.metrics.counter(metrics::SUBMIT_FAILED, 1);
            }
        }
        self.metrics
            .gauge(metrics::PENDING_ENTRIES, self.pending.len() as i64);
        result
    }

    async fn submit_inner(
        &self,
        request: SubmitRequest,
        cancel: &CancellationToken,
    ) -> DataAccessResult<SubmitReceipt> {
        if cancel.is_cancelled() {
            return Err(DataAccessError::Cancelled);
        }
        let SubmitRequest {
            channel_id,
            payload,
            topics,
        } = request;

        let envelope = Envelope::new(channel_id, topics.clone(), payload.clone())?;
        let bytes = envelope.encode()?;
        let content_hash = keccak256(&bytes);

        if let Some(existing) = self.pending.find_by_content(&channel_id, &content_hash) {
            debug!(channel = %channel_id, anchor = %existing.anchor_tx_ref, "Submission already pending");
            self.metrics.counter(metrics::SUBMIT_DEDUPLICATED, 1);
            return Ok(SubmitReceipt::from(&existing));
        }
        self.pending.check_capacity(&channel_id)?;

        let content_address = self
            .retry
            .run(
                "content_store.put",
                self.timeouts.content_store(),
                cancel,
                &self.metrics,
                || self.content.put(bytes.clone()),
            )
            .await
            .map_err(|e| match e {
                RetryError::Cancelled => DataAccessError::Cancelled,
                RetryError::Exhausted { last, .. } => DataAccessError::Storage(last),
                RetryError::Fatal(e) => DataAccessError::Storage(e),
            })?;
        debug!(channel = %channel_id, content = %content_address, size = bytes.len(), "Content stored");

        let metadata = AnchorMetadata {
            channel_id,
            topics: topics.clone(),
            content_size: bytes.len() as u64,
            chain_id: self.chain_id,
        };
        let anchor_tx_ref = self
            .retry
            .run(
                "chain_anchor.submit",
                self.timeouts.chain_anchor(),
                cancel,
                &self.metrics,
                || self.anchor.submit(&content_address, &metadata),
            )
            .await
            .map_err(|e| match e {
                RetryError::Cancelled => DataAccessError::Cancelled,
                RetryError::Exhausted { attempts, last } => DataAccessError::Unavailable {
                    collaborator: "chain anchor",
                    attempts,
                    last,
                },
                RetryError::Fatal(e) if e.kind == ErrorKind::Rejected => {
                    DataAccessError::AnchorRejected(e.message)
                }
                RetryError::Fatal(e) => DataAccessError::BadData(e.to_string()),
            })?;

        // Anchored content is always tracked, even if cancellation fired
        // during the anchor call.
        let submitted_at = current_timestamp();
        let entry = PendingEntry {
            channel_id,
            content_address: content_address.clone(),
            content_hash,
            topics,
            submitted_at,
            anchor_tx_ref,
            status: PendingStatus::Submitted,
            transaction: Transaction::from_payload(
                channel_id,
                None,
                content_address,
                payload,
                submitted_at,
            ),
        };

        match self.pending.add(entry.clone()) {
            Ok(()) => {
                info!(
                    channel = %channel_id,
                    anchor = %anchor_tx_ref,
                    content = %entry.content_address,
                    "Transaction submitted"
                );
                Ok(SubmitReceipt::from(&entry))
            }
            Err(e @ (PendingError::DuplicateEntry(_) | PendingError::DuplicateContent(_))) => {
                // A concurrent submit of the same payload registered first
                match self.pending.find_by_content(&channel_id, &content_hash) {
                    Some(existing) => {
                        self.metrics.counter(metrics::SUBMIT_DEDUPLICATED, 1);
                        Ok(SubmitReceipt::from(&existing))
                    }
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drain submissions abandoned by pruning since the last poll
    pub fn poll_failures(&self) -> Vec<FailedSubmission> {
        let max_age = self.max_age.as_secs();
        self.pending
            .take_failed()
            .iter()
            .map(|entry| FailedSubmission {
                receipt: SubmitReceipt::from(entry),
                reason: format!("not confirmed within {}s", max_age),
            })
            .collect()
    }

    /// Prune entries pending for longer than the configured maximum age.
    ///
    /// Returns the number of pruned entries.
    pub fn prune_expired(&self) -> usize {
        let pruned = self.pending.prune(self.max_age).len();
        if pruned > 0 {
            self.metrics.counter(metrics::PENDING_PRUNED, pruned as u64);
        }
        self.metrics
            .gauge(metrics::PENDING_ENTRIES, self.pending.len() as i64);
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryChain, MemoryContentStore};
    use reqnet_pending::PendingConfig;
    use reqnet_types::{IdentityType, Signature, SignatureMethod};

    fn config() -> DataAccessConfig {
        let mut config = DataAccessConfig::default();
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config.retry.jitter = false;
        config
    }

    fn setup() -> (Arc<MemoryContentStore>, Arc<MemoryChain>, Arc<PendingStore>, DataAccessWrite) {
        setup_with(PendingConfig::default())
    }

    fn setup_with(
        limits: PendingConfig,
    ) -> (Arc<MemoryContentStore>, Arc<MemoryChain>, Arc<PendingStore>, DataAccessWrite) {
        let content = Arc::new(MemoryContentStore::new());
        let chain = Arc::new(MemoryChain::new());
        let pending = Arc::new(PendingStore::new(limits));
        let write = DataAccessWrite::new(
            content.clone(),
            chain.clone(),
            pending.clone(),
            &config(),
            1337,
            Arc::new(Metrics::new()),
        );
        (content, chain, pending, write)
    }

    fn request(data: &str) -> SubmitRequest {
        SubmitRequest {
            channel_id: ChannelId::new(H256::from_bytes([1; 32])),
            payload: SignedPayload::clear(
                data,
                Signature::new(SignatureMethod::Ecdsa, IdentityType::EthereumAddress, "0x01"),
            ),
            topics: vec![],
        }
    }

    #[tokio::test]
    async fn test_submit_registers_pending() {
        let (content, chain, pending, write) = setup();
        let receipt = write.submit(request("a"), &CancellationToken::new()).await.unwrap();

        assert!(content.contains(&receipt.content_address));
        assert_eq!(chain.mempool_len(), 1);
        let entry = pending.get_by_ref(&receipt.anchor_tx_ref).unwrap();
        assert_eq!(entry.transaction.position, None);
        assert_eq!(entry.transaction.data.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_payload() {
        let (content, _, _, write) = setup();
        let mut req = request("a");
        req.payload.data = None;
        let err = write.submit(req, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DataAccessError::InvalidRequest(_)));
        assert_eq!(content.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_resubmit_is_idempotent() {
        let (content, chain, pending, write) = setup();
        let first = write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        let second = write.submit(request("a"), &CancellationToken::new()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(content.put_calls(), 1);
        assert_eq!(chain.submit_calls(), 1);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_content_failure_is_storage_error() {
        let (content, chain, pending, write) = setup();
        content.fail_puts(ErrorKind::Corrupt, 1);
        let err = write.submit(request("a"), &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, DataAccessError::Storage(ref e) if e.kind == ErrorKind::Corrupt));
        assert_eq!(chain.submit_calls(), 0);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_transient_content_failure_retried() {
        let (content, _, pending, write) = setup();
        content.fail_puts(ErrorKind::Connection, 2);
        write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        assert_eq!(content.put_calls(), 3);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_anchor_rejected_not_retried() {
        let (_, chain, pending, write) = setup();
        chain.reject_next_submit("insufficient funds");
        let err = write.submit(request("a"), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, DataAccessError::AnchorRejected("insufficient funds".to_string()));
        assert_eq!(chain.submit_calls(), 1);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_full_channel_refused_before_anchoring() {
        let (content, chain, pending, write) = setup_with(PendingConfig {
            max_per_channel: 1,
            ..Default::default()
        });
        write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        assert_eq!(chain.submit_calls(), 1);

        let err = write.submit(request("b"), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DataAccessError::Pending(PendingError::ChannelFull { max: 1, .. })
        ));
        assert_eq!(content.put_calls(), 1);
        assert_eq!(chain.submit_calls(), 1);
        assert_eq!(chain.mempool_len(), 1);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_full_store_refused_before_anchoring() {
        let (content, chain, pending, write) = setup_with(PendingConfig {
            max_entries: 1,
            max_per_channel: 1,
            ..Default::default()
        });
        let mut other = request("a");
        other.channel_id = ChannelId::new(H256::from_bytes([2; 32]));
        write.submit(other, &CancellationToken::new()).await.unwrap();

        let err = write.submit(request("b"), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, DataAccessError::Pending(PendingError::StoreFull(1)));
        assert_eq!(content.put_calls(), 1);
        assert_eq!(chain.submit_calls(), 1);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_resubmit_after_confirmation_anchors_again() {
        let (_, chain, pending, write) = setup();
        let first = write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        pending.mark_confirmed(&first.content_address);

        let second = write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        assert_eq!(second.content_address, first.content_address);
        assert_ne!(second.anchor_tx_ref, first.anchor_tx_ref);
        assert_eq!(chain.submit_calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (content, _, _, write) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = write.submit(request("a"), &cancel).await.unwrap_err();
        assert_eq!(err, DataAccessError::Cancelled);
        assert_eq!(content.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_poll_failures_after_prune() {
        let (_, _, pending, write) = setup();
        let receipt = write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        pending.prune_at(Duration::from_secs(1), receipt.submitted_at + 10);

        let failures = write.poll_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].receipt, receipt);
        assert!(write.poll_failures().is_empty());
    }

    #[tokio::test]
    async fn test_prune_expired_keeps_fresh_entries() {
        let (_, _, pending, write) = setup();
        write.submit(request("a"), &CancellationToken::new()).await.unwrap();
        assert_eq!(write.prune_expired(), 0);
        assert_eq!(pending.len(), 1);
    }
}
