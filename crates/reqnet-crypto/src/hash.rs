//! Keccak-256 and SHA-256 hashing

use reqnet_primitives::{ChannelId, ContentAddress, H256};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Compute SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Channel id of a request: the Keccak-256 of its creation payload.
pub fn channel_id_for(creation_payload: &[u8]) -> ChannelId {
    ChannelId::new(keccak256(creation_payload))
}

/// Content address of `data` in a digest-addressed store (SHA-256).
pub fn content_address_for(data: &[u8]) -> ContentAddress {
    ContentAddress::from_digest(&sha256(data))
}
