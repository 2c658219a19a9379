//! # reqnet-pending
//!
//! Local bridge between "submitted" and "confirmed by the indexer".
//!
//! This crate provides:
//! - Registration of submitted transactions, keyed by anchor reference
//! - Per-channel submission order
//! - Idempotent promotion once the indexer reports the anchor
//! - Age-based pruning with queued failure notifications
//!
//! ## Architecture
//!
//! ```text
//! +--------------------+
//! |    PendingStore    |
//! +--------------------+
//!           |
//! +--------------------+
//! | Per-channel order  |  <- RwLock per channel
//! +--------------------+
//!           |
//! +---------+----------+
//! | By anchor | By CID |  <- Fast lookup indexes
//! +---------+----------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use reqnet_pending::PendingStore;
//!
//! let store = PendingStore::with_defaults();
//! store.add(entry)?;
//! let pending = store.list_pending(&channel_id);
//! store.mark_confirmed(&content_address);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod store;

pub use error::{PendingError, PendingResult};
pub use store::{PendingConfig, PendingEntry, PendingEvent, PendingStatus, PendingStore};
