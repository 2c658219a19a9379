//! # reqnet-data-access
//!
//! Data-access layer for request transactions.
//!
//! Transactions are written to content-addressed storage, their addresses
//! anchored on-chain, and the submissions tracked locally until the chain
//! indexer reports them. Reads merge the indexed history of a channel with
//! the still-pending submissions.
//!
//! ## Architecture
//!
//! ```text
//!             +--------------------+
//!             |     DataAccess     |
//!             +--------------------+
//!               |                |
//!   +-----------------+   +-----------------+
//!   | DataAccessWrite |   | DataAccessRead  |
//!   +-----------------+   +-----------------+
//!     |      |      \       /      |      |
//! Content  Chain   PendingStore  Chain  Content
//!  Store   Anchor                Indexer  Store
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use reqnet_data_access::{Collaborators, DataAccess, DataAccessConfig};
//!
//! let access = DataAccess::new(config, &registry, collaborators)?;
//! let receipt = access.submit(request, &cancel).await?;
//! let view = access.get_channel(&receipt.channel_id, &cancel).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod metrics;

mod config;
mod error;
#[cfg(feature = "http")]
mod ipfs;
mod memory;
mod read;
mod retry;
mod traits;
mod write;

pub use config::{DataAccessConfig, ReadConfig, RetryConfig, TimeoutConfig};
pub use error::{CollaboratorError, DataAccessError, DataAccessResult, ErrorKind, FailureKind};
#[cfg(feature = "http")]
pub use ipfs::IpfsContentStore;
pub use memory::{MemoryChain, MemoryContentStore};
pub use metrics::{Metrics, MetricsSnapshot};
pub use read::{order_anchors, ChannelEntry, ChannelView, DataAccessRead};
pub use retry::{RetryError, RetryPolicy};
pub use traits::{AnchorMetadata, ChainAnchor, ChainIndexer, ConfirmedAnchor, ContentStore};
pub use write::{DataAccessWrite, FailedSubmission, SubmitReceipt, SubmitRequest};

use reqnet_pending::{PendingEvent, PendingStore};
use reqnet_primitives::{ChannelId, ContentAddress, Topic};
use reqnet_types::{ChainRegistry, EvmChain, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// External systems the data-access layer talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Payload storage
    pub content: Arc<dyn ContentStore>,
    /// On-chain anchoring
    pub anchor: Arc<dyn ChainAnchor>,
    /// Confirmed anchor lookup
    pub indexer: Arc<dyn ChainIndexer>,
}

impl Collaborators {
    /// Bundle collaborators
    pub fn new(
        content: Arc<dyn ContentStore>,
        anchor: Arc<dyn ChainAnchor>,
        indexer: Arc<dyn ChainIndexer>,
    ) -> Self {
        Self {
            content,
            anchor,
            indexer,
        }
    }

    /// In-memory content store and chain, returned alongside for test control
    pub fn in_memory() -> (Self, Arc<MemoryContentStore>, Arc<MemoryChain>) {
        let content = Arc::new(MemoryContentStore::new());
        let chain = Arc::new(MemoryChain::new());
        let collaborators = Self::new(content.clone(), chain.clone(), chain.clone());
        (collaborators, content, chain)
    }
}

/// Data-access facade: write path, read path and their shared pending store
pub struct DataAccess {
    config: DataAccessConfig,
    chain: EvmChain,
    pending: Arc<PendingStore>,
    write: Arc<DataAccessWrite>,
    read: DataAccessRead,
    metrics: Arc<Metrics>,
}

impl DataAccess {
    /// Validate `config`, resolve its network in `registry` and wire the
    /// collaborators.
    pub fn new(
        config: DataAccessConfig,
        registry: &ChainRegistry<EvmChain>,
        collaborators: Collaborators,
    ) -> DataAccessResult<Self> {
        config.validate()?;
        let chain = registry
            .require(&config.network)
            .map_err(|e| DataAccessError::Config(e.to_string()))?
            .clone();

        let metrics = Arc::new(Metrics::new());
        let pending = Arc::new(PendingStore::new(config.pending.clone()));
        let write = Arc::new(DataAccessWrite::new(
            collaborators.content.clone(),
            collaborators.anchor,
            pending.clone(),
            &config,
            chain.chain_id,
            metrics.clone(),
        ));
        let read = DataAccessRead::new(
            collaborators.content,
            collaborators.indexer,
            pending.clone(),
            &config,
            metrics.clone(),
        );

        info!(network = %chain.name, chain_id = chain.chain_id, "Data access initialized");
        Ok(Self {
            config,
            chain,
            pending,
            write,
            read,
            metrics,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &DataAccessConfig {
        &self.config
    }

    /// Anchoring chain
    pub fn chain(&self) -> &EvmChain {
        &self.chain
    }

    /// Shared pending store
    pub fn pending(&self) -> &Arc<PendingStore> {
        &self.pending
    }

    /// Persist, anchor and register a transaction
    pub async fn submit(
        &self,
        request: SubmitRequest,
        cancel: &CancellationToken,
    ) -> DataAccessResult<SubmitReceipt> {
        self.write.submit(request, cancel).await
    }

    /// Current view of a channel
    pub async fn get_channel(
        &self,
        channel: &ChannelId,
        cancel: &CancellationToken,
    ) -> DataAccessResult<ChannelView> {
        self.read.get_channel(channel, cancel).await
    }

    /// Channels indexed or pending under `topic`
    pub async fn get_channels_by_topic(
        &self,
        topic: &Topic,
        cancel: &CancellationToken,
    ) -> DataAccessResult<Vec<ChannelView>> {
        self.read.get_channels_by_topic(topic, cancel).await
    }

    /// Channels indexed or pending under any of `topics`
    pub async fn get_channels_by_multiple_topics(
        &self,
        topics: &[Topic],
        cancel: &CancellationToken,
    ) -> DataAccessResult<Vec<ChannelView>> {
        self.read.get_channels_by_multiple_topics(topics, cancel).await
    }

    /// Poll the channel until `content_address` is confirmed.
    ///
    /// Returns `None` if it is still unconfirmed after `timeout`, and
    /// `BadData` if it was confirmed but cannot be read.
    pub async fn wait_for_confirmation(
        &self,
        channel: &ChannelId,
        content_address: &ContentAddress,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> DataAccessResult<Option<Transaction>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let view = self.get_channel(channel, cancel).await?;
            if let Some(tx) = view
                .confirmed()
                .find(|tx| &tx.content_address == content_address)
            {
                return Ok(Some(tx.clone()));
            }
            if let Some(ChannelEntry::Failed { error, .. }) = view
                .failures()
                .find(|e| e.content_address() == content_address)
            {
                return Err(DataAccessError::BadData(error.to_string()));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                debug!(channel = %channel, content = %content_address, "Confirmation wait timed out");
                return Ok(None);
            }
            let delay = self.config.confirmation_poll().min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(DataAccessError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Subscribe to pending store events
    pub fn subscribe(&self) -> broadcast::Receiver<PendingEvent> {
        self.pending.subscribe()
    }

    /// Drain submissions abandoned since the last poll
    pub fn poll_failures(&self) -> Vec<FailedSubmission> {
        self.write.poll_failures()
    }

    /// Prune entries pending longer than the configured maximum age
    pub fn prune_expired(&self) -> usize {
        self.write.prune_expired()
    }

    /// Prune expired entries every `prune_interval_secs` until `cancel` fires
    pub fn spawn_pruner(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let write = self.write.clone();
        let period = self.config.prune_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Pruner stopped");
                        return;
                    }
                    _ = interval.tick() => {
                        write.prune_expired();
                    }
                }
            }
        })
    }

    /// Capture current metrics
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .gauge(metrics::PENDING_ENTRIES, self.pending.len() as i64);
        self.metrics.snapshot()
    }
}
