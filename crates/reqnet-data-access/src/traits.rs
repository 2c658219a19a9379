//! Collaborator interfaces

use crate::error::CollaboratorError;
use async_trait::async_trait;
use bytes::Bytes;
use reqnet_primitives::{AnchorTxRef, BlockOrder, ChannelId, ContentAddress, Timestamp, Topic};
use serde::{Deserialize, Serialize};

/// Content-addressed payload storage (object-safe)
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their address
    async fn put(&self, data: Bytes) -> Result<ContentAddress, CollaboratorError>;

    /// Fetch bytes by address
    async fn get(&self, address: &ContentAddress) -> Result<Bytes, CollaboratorError>;
}

/// Information submitted along with an anchored content address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorMetadata {
    /// Channel the content belongs to
    pub channel_id: ChannelId,
    /// Topics to index the channel under
    pub topics: Vec<Topic>,
    /// Size of the stored content in bytes
    pub content_size: u64,
    /// Chain the anchor is submitted to
    pub chain_id: u64,
}

/// Writes content references on-chain (object-safe)
#[async_trait]
pub trait ChainAnchor: Send + Sync {
    /// Submit an anchor; returns once the anchoring transaction is broadcast
    async fn submit(
        &self,
        address: &ContentAddress,
        metadata: &AnchorMetadata,
    ) -> Result<AnchorTxRef, CollaboratorError>;
}

/// Anchor reported by the indexer as confirmed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedAnchor {
    /// Anchored content
    pub content_address: ContentAddress,
    /// Anchoring transaction
    pub anchor_tx_ref: AnchorTxRef,
    /// Position on the chain
    pub block_order: BlockOrder,
    /// Block time (seconds)
    pub block_timestamp: Timestamp,
}

/// Reads confirmed anchors (object-safe)
#[async_trait]
pub trait ChainIndexer: Send + Sync {
    /// Confirmed anchors of a channel, in any order
    async fn query_confirmed(&self, channel: &ChannelId) -> Result<Vec<ConfirmedAnchor>, CollaboratorError>;

    /// Channels with a confirmed anchor under any of `topics`
    async fn query_channels_by_topics(&self, topics: &[Topic]) -> Result<Vec<ChannelId>, CollaboratorError>;
}
