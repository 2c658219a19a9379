//! # reqnet-crypto
//!
//! Hashing for the request data-access layer.
//!
//! - Keccak-256 (channel ids, content hashes)
//! - SHA-256 (content addresses of in-memory stores)
//!
//! Signatures are produced and verified outside this workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::{channel_id_for, content_address_for, keccak256, sha256};
