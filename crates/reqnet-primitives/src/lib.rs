//! # reqnet-primitives
//!
//! Primitive identifiers shared by every layer of the request data-access
//! stack.
//!
//! - [`H256`]: 32-byte hash, rendered as `0x`-prefixed lowercase hex
//! - [`ChannelId`]: aggregation key of a request's transactions
//! - [`ContentAddress`]: address of a payload in content-addressed storage
//! - [`AnchorTxRef`]: reference of the on-chain transaction anchoring a payload
//! - [`BlockOrder`]: confirmation order reported by the chain indexer

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod ids;

pub use error::PrimitiveError;
pub use hash::{HashError, H256};
pub use ids::{AnchorTxRef, BlockOrder, ChannelId, ContentAddress, Topic};

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Current unix timestamp in seconds.
///
/// Returns 0 when the system clock is set before the unix epoch.
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
