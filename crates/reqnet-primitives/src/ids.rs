//! Identifiers of channels, contents, anchors and confirmation order

use crate::error::PrimitiveError;
use crate::hash::H256;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(H256);

        impl $name {
            /// Wrap a hash
            pub const fn new(hash: H256) -> Self {
                $name(hash)
            }

            /// Parse from hex string, with or without `0x` prefix
            pub fn from_hex(s: &str) -> Result<Self, PrimitiveError> {
                Ok($name(H256::from_hex(s)?))
            }

            /// Underlying hash
            pub fn hash(&self) -> &H256 {
                &self.0
            }

            /// `0x`-prefixed lowercase hex
            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<H256> for $name {
            fn from(hash: H256) -> Self {
                $name(hash)
            }
        }
    };
}

hash_id!(
    /// Identifier of a channel: the sequence of transactions of one request
    ChannelId
);

hash_id!(
    /// Reference of the on-chain transaction that anchored a content address.
    ///
    /// Ordering is lexicographic over the hex rendering; it is the tie-break
    /// between anchors reported at the same block position.
    AnchorTxRef
);

hash_id!(
    /// Search topic attached to a channel
    Topic
);

/// Address of a payload in content-addressed storage (an IPFS CID or a
/// `0x`-hex digest for in-memory stores).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Create from a non-empty address without whitespace
    pub fn new(address: impl Into<String>) -> Result<Self, PrimitiveError> {
        let address = address.into();
        if address.is_empty() || address.chars().any(char::is_whitespace) {
            return Err(PrimitiveError::InvalidContentAddress(address));
        }
        Ok(ContentAddress(address))
    }

    /// Address of a content identified by its digest
    pub fn from_digest(digest: &H256) -> Self {
        ContentAddress(digest.to_hex())
    }

    /// Address as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.0)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentAddress::new(value)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.0
    }
}

impl std::str::FromStr for ContentAddress {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentAddress::new(s)
    }
}

/// Position of an anchor on the chain: block number, then index of the
/// anchoring transaction inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockOrder {
    /// Block number
    pub block_number: u64,
    /// Transaction index inside the block
    pub tx_index: u32,
}

impl BlockOrder {
    /// Create a block order
    pub const fn new(block_number: u64, tx_index: u32) -> Self {
        Self {
            block_number,
            tx_index,
        }
    }
}

impl fmt::Display for BlockOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.tx_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display_is_hex() {
        let id = ChannelId::new(H256::from_bytes([0xab; 32]));
        assert_eq!(id.to_string(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_channel_id_from_hex_rejects_short() {
        assert!(ChannelId::from_hex("0x01").is_err());
    }

    #[test]
    fn test_anchor_ref_tie_break_is_lexicographic() {
        let low = AnchorTxRef::from_hex(&format!("0x{}", "0f".repeat(32))).unwrap();
        let high = AnchorTxRef::from_hex(&format!("0x{}", "f0".repeat(32))).unwrap();
        assert!(low < high);
        assert!(low.to_hex() < high.to_hex());
    }

    #[test]
    fn test_content_address_validation() {
        assert!(ContentAddress::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").is_ok());
        assert!(ContentAddress::new("").is_err());
        assert!(ContentAddress::new("has space").is_err());
    }

    #[test]
    fn test_content_address_serde_validates() {
        let ok: ContentAddress = serde_json::from_str("\"QmHash\"").unwrap();
        assert_eq!(ok.as_str(), "QmHash");
        assert!(serde_json::from_str::<ContentAddress>("\"\"").is_err());
    }

    #[test]
    fn test_block_order_sorts_by_block_then_index() {
        let mut orders = vec![
            BlockOrder::new(5, 2),
            BlockOrder::new(4, 9),
            BlockOrder::new(5, 0),
        ];
        orders.sort();
        assert_eq!(
            orders,
            vec![BlockOrder::new(4, 9), BlockOrder::new(5, 0), BlockOrder::new(5, 2)]
        );
    }
}
