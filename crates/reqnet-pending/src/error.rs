//! Pending store error types

use reqnet_primitives::{AnchorTxRef, ChannelId, ContentAddress};
use thiserror::Error;

/// Pending store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PendingError {
    /// Anchor reference already registered
    #[error("pending entry already exists for anchor {0}")]
    DuplicateEntry(AnchorTxRef),

    /// Content address already registered under another anchor
    #[error("content {0} is already pending")]
    DuplicateContent(ContentAddress),

    /// Store is full
    #[error("pending store is full (max entries: {0})")]
    StoreFull(usize),

    /// Channel holds too many pending entries
    #[error("channel {channel} is full (max entries: {max})")]
    ChannelFull {
        /// Channel
        channel: ChannelId,
        /// Per-channel limit
        max: usize,
    },
}

/// Result type for pending store operations
pub type PendingResult<T> = Result<T, PendingError>;
