//! Read path: merge indexed history with pending submissions

use crate::config::{DataAccessConfig, ReadConfig, TimeoutConfig};
use crate::error::{CollaboratorError, DataAccessError, DataAccessResult};
use crate::metrics::{self, Metrics};
use crate::retry::{RetryError, RetryPolicy};
use crate::traits::{ChainIndexer, ConfirmedAnchor, ContentStore};
use reqnet_pending::PendingStore;
use reqnet_primitives::{AnchorTxRef, ChannelId, ContentAddress, Topic};
use reqnet_types::{Envelope, SignedPayload, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One transaction slot of a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChannelEntry {
    /// Confirmed and readable
    Confirmed {
        /// Index in the confirmed sequence
        position: u64,
        /// Anchor as reported by the indexer
        anchor: ConfirmedAnchor,
        /// Transaction
        transaction: Transaction,
    },
    /// Confirmed, but the content could not be fetched or parsed
    Failed {
        /// Index in the confirmed sequence
        position: u64,
        /// Anchor as reported by the indexer
        anchor: ConfirmedAnchor,
        /// Fetch or parse failure
        error: CollaboratorError,
    },
    /// Submitted locally, not yet reported by the indexer
    Pending {
        /// Anchoring transaction
        anchor_tx_ref: AnchorTxRef,
        /// Transaction, without position
        transaction: Transaction,
    },
}

impl ChannelEntry {
    /// Position in the confirmed sequence
    pub fn position(&self) -> Option<u64> {
        match self {
            ChannelEntry::Confirmed { position, .. } | ChannelEntry::Failed { position, .. } => {
                Some(*position)
            }
            ChannelEntry::Pending { .. } => None,
        }
    }

    /// Transaction, unless the entry failed
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            ChannelEntry::Confirmed { transaction, .. }
            | ChannelEntry::Pending { transaction, .. } => Some(transaction),
            ChannelEntry::Failed { .. } => None,
        }
    }

    /// Address of the stored envelope
    pub fn content_address(&self) -> &ContentAddress {
        match self {
            ChannelEntry::Confirmed { anchor, .. } | ChannelEntry::Failed { anchor, .. } => {
                &anchor.content_address
            }
            ChannelEntry::Pending { transaction, .. } => &transaction.content_address,
        }
    }

    /// Check if pending
    pub fn is_pending(&self) -> bool {
        matches!(self, ChannelEntry::Pending { .. })
    }
}

/// State of a channel: confirmed entries by position, then pending entries
/// in submission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    /// Channel
    pub channel_id: ChannelId,
    /// Entries
    pub entries: Vec<ChannelEntry>,
    /// Built from pending state only because the indexer was unreachable
    pub degraded: bool,
}

impl ChannelView {
    /// Readable transactions in order: confirmed, then pending
    pub fn transactions(&self) -> Vec<Transaction> {
        self.entries
            .iter()
            .filter_map(|e| e.transaction().cloned())
            .collect()
    }

    /// Confirmed, readable transactions in position order
    pub fn confirmed(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().filter_map(|e| match e {
            ChannelEntry::Confirmed { transaction, .. } => Some(transaction),
            _ => None,
        })
    }

    /// Pending transactions in submission order
    pub fn pending(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().filter_map(|e| match e {
            ChannelEntry::Pending { transaction, .. } => Some(transaction),
            _ => None,
        })
    }

    /// Entries that could not be read
    pub fn failures(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, ChannelEntry::Failed { .. }))
    }

    /// Check if the channel has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort anchors by chain position, ties broken by anchor reference, and
/// drop repeated content addresses after their first occurrence.
pub fn order_anchors(mut anchors: Vec<ConfirmedAnchor>) -> Vec<ConfirmedAnchor> {
    anchors.sort_by_key(|a| (a.block_order, a.anchor_tx_ref));
    let mut seen = HashSet::new();
    anchors.retain(|a| seen.insert(a.content_address.clone()));
    anchors
}

/// Read half of the data-access layer
pub struct DataAccessRead {
    content: Arc<dyn ContentStore>,
    indexer: Arc<dyn ChainIndexer>,
    pending: Arc<PendingStore>,
    retry: RetryPolicy,
    timeouts: TimeoutConfig,
    read: ReadConfig,
    metrics: Arc<Metrics>,
}

impl DataAccessRead {
    /// Create the read path
    pub fn new(
        content: Arc<dyn ContentStore>,
        indexer: Arc<dyn ChainIndexer>,
        pending: Arc<PendingStore>,
        config: &DataAccessConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            content,
            indexer,
            pending,
            retry: RetryPolicy::from_config(&config.retry),
            timeouts: config.timeouts.clone(),
            read: config.read.clone(),
            metrics,
        }
    }

    /// Current view of a channel
    pub async fn get_channel(
        &self,
        channel: &ChannelId,
        cancel: &CancellationToken,
    ) -> DataAccessResult<ChannelView> {
        self.metrics.counter(metrics::READ_TOTAL, 1);
        crate::timed!(self.metrics, metrics::READ_LATENCY, {
            self.get_channel_inner(channel, cancel).await
        })
    }

    async fn get_channel_inner(
        &self,
        channel: &ChannelId,
        cancel: &CancellationToken,
    ) -> DataAccessResult<ChannelView> {
        if cancel.is_cancelled() {
            return Err(DataAccessError::Cancelled);
        }

        let anchors = match self
            .retry
            .run(
                "chain_indexer.query_confirmed",
                self.timeouts.chain_indexer(),
                cancel,
                &self.metrics,
                || self.indexer.query_confirmed(channel),
            )
            .await
        {
            Ok(anchors) => order_anchors(anchors),
            Err(RetryError::Cancelled) => return Err(DataAccessError::Cancelled),
            Err(RetryError::Exhausted { last: e, .. }) | Err(RetryError::Fatal(e)) => {
                if self.read.fallback_to_pending {
                    warn!(channel = %channel, error = %e, "Indexer unavailable, serving pending entries only");
                    self.metrics.counter(metrics::READ_DEGRADED, 1);
                    return Ok(self.pending_only(channel));
                }
                return Err(DataAccessError::IndexUnavailable(e));
            }
        };

        let confirmed: HashSet<ContentAddress> =
            anchors.iter().map(|a| a.content_address.clone()).collect();

        let mut entries = Vec::with_capacity(anchors.len());
        for (position, anchor) in anchors.into_iter().enumerate() {
            let position = position as u64;
            match self.fetch(channel, &anchor.content_address, cancel).await {
                Ok(payload) => {
                    let transaction = Transaction::from_payload(
                        *channel,
                        Some(position),
                        anchor.content_address.clone(),
                        payload,
                        anchor.block_timestamp,
                    );
                    entries.push(ChannelEntry::Confirmed {
                        position,
                        anchor,
                        transaction,
                    });
                }
                Err(RetryError::Cancelled) => return Err(DataAccessError::Cancelled),
                Err(RetryError::Exhausted { last: error, .. }) | Err(RetryError::Fatal(error)) => {
                    warn!(
                        channel = %channel,
                        position,
                        content = %anchor.content_address,
                        error = %error,
                        "Confirmed entry unreadable"
                    );
                    self.metrics.counter(metrics::READ_FAILED_ENTRIES, 1);
                    entries.push(ChannelEntry::Failed {
                        position,
                        anchor,
                        error,
                    });
                }
            }
        }

        let mut promoted = 0u64;
        for entry in self.pending.list_pending(channel) {
            if confirmed.contains(&entry.content_address) {
                if self.pending.mark_confirmed(&entry.content_address).is_some() {
                    promoted += 1;
                }
                continue;
            }
            entries.push(ChannelEntry::Pending {
                anchor_tx_ref: entry.anchor_tx_ref,
                transaction: entry.transaction,
            });
        }
        if promoted > 0 {
            info!(channel = %channel, promoted, "Promoted pending entries");
            self.metrics.counter(metrics::READ_PROMOTED, promoted);
            self.metrics
                .gauge(metrics::PENDING_ENTRIES, self.pending.len() as i64);
        }

        debug!(channel = %channel, entries = entries.len(), "Channel read");
        Ok(ChannelView {
            channel_id: *channel,
            entries,
            degraded: false,
        })
    }

    async fn fetch(
        &self,
        channel: &ChannelId,
        address: &ContentAddress,
        cancel: &CancellationToken,
    ) -> Result<SignedPayload, RetryError> {
        let bytes = self
            .retry
            .run(
                "content_store.get",
                self.timeouts.content_store(),
                cancel,
                &self.metrics,
                || self.content.get(address),
            )
            .await?;
        Envelope::parse(&bytes, channel)
            .map(|envelope| envelope.transaction)
            .map_err(|e| RetryError::Fatal(e.into()))
    }

    fn pending_only(&self, channel: &ChannelId) -> ChannelView {
        let entries = self
            .pending
            .list_pending(channel)
            .into_iter()
            .map(|entry| ChannelEntry::Pending {
                anchor_tx_ref: entry.anchor_tx_ref,
                transaction: entry.transaction,
            })
            .collect();
        ChannelView {
            channel_id: *channel,
            entries,
            degraded: true,
        }
    }

    /// Views of the channels indexed or pending under `topic`, by channel id
    pub async fn get_channels_by_topic(
        &self,
        topic: &Topic,
        cancel: &CancellationToken,
    ) -> DataAccessResult<Vec<ChannelView>> {
        self.get_channels_by_multiple_topics(std::slice::from_ref(topic), cancel)
            .await
    }

    /// Views of the channels indexed or pending under any of `topics`, by
    /// channel id
    pub async fn get_channels_by_multiple_topics(
        &self,
        topics: &[Topic],
        cancel: &CancellationToken,
    ) -> DataAccessResult<Vec<ChannelView>> {
        if cancel.is_cancelled() {
            return Err(DataAccessError::Cancelled);
        }

        let indexed = match self
            .retry
            .run(
                "chain_indexer.query_channels_by_topics",
                self.timeouts.chain_indexer(),
                cancel,
                &self.metrics,
                || self.indexer.query_channels_by_topics(topics),
            )
            .await
        {
            Ok(channels) => channels,
            Err(RetryError::Cancelled) => return Err(DataAccessError::Cancelled),
            Err(RetryError::Exhausted { last: e, .. }) | Err(RetryError::Fatal(e)) => {
                if !self.read.fallback_to_pending {
                    return Err(DataAccessError::IndexUnavailable(e));
                }
                warn!(error = %e, "Indexer unavailable, searching pending entries only");
                Vec::new()
            }
        };

        let mut channels: BTreeSet<ChannelId> = indexed.into_iter().collect();
        for topic in topics {
            channels.extend(self.pending.channels_with_topic(topic));
        }

        let mut views = Vec::with_capacity(channels.len());
        for channel in channels {
            views.push(self.get_channel(&channel, cancel).await?);
        }
        Ok(views)
    }
}
