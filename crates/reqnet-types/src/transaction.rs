//! Transaction types

use reqnet_primitives::{ChannelId, ContentAddress, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of identity that signed a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IdentityType {
    /// Externally owned Ethereum account
    #[default]
    #[serde(rename = "ethereumAddress")]
    EthereumAddress,
    /// Ethereum smart-contract account
    #[serde(rename = "ethereumSmartContract")]
    EthereumSmartContract,
}

/// Signature scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// Raw secp256k1 ECDSA over the payload hash
    #[default]
    #[serde(rename = "ecdsa")]
    Ecdsa,
    /// ECDSA over the Ethereum-prefixed message hash
    #[serde(rename = "ecdsa-ethereum")]
    EcdsaEthereum,
}

/// Externally produced signature, carried opaquely
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    /// Signature scheme
    pub method: SignatureMethod,
    /// Identity kind of the signer
    pub identity_type: IdentityType,
    /// Encoded signature value
    pub value: String,
}

impl Signature {
    /// Create a signature
    pub fn new(method: SignatureMethod, identity_type: IdentityType, value: impl Into<String>) -> Self {
        Self {
            method,
            identity_type,
            value: value.into(),
        }
    }
}

/// Signed payload of a transaction as written by its author.
///
/// At least one of `data` and `encrypted_data` is present.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    /// Clear payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Encrypted payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
    /// Author signature
    pub signature: Signature,
}

impl SignedPayload {
    /// Clear payload
    pub fn clear(data: impl Into<String>, signature: Signature) -> Self {
        Self {
            data: Some(data.into()),
            encrypted_data: None,
            signature,
        }
    }

    /// Encrypted payload
    pub fn encrypted(encrypted_data: impl Into<String>, signature: Signature) -> Self {
        Self {
            data: None,
            encrypted_data: Some(encrypted_data.into()),
            signature,
        }
    }

    /// Whether the payload carries data
    pub fn has_payload(&self) -> bool {
        self.data.is_some() || self.encrypted_data.is_some()
    }
}

/// A transaction of a channel.
///
/// `position` is `Some` only once the anchor is confirmed; pending
/// transactions have none. `timestamp` is the confirming block time for
/// confirmed transactions and the submission time for pending ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Channel the transaction belongs to
    pub channel_id: ChannelId,
    /// Position in the confirmed sequence
    pub position: Option<u64>,
    /// Address of the stored envelope
    pub content_address: ContentAddress,
    /// Clear payload
    pub data: Option<String>,
    /// Encrypted payload
    pub encrypted_data: Option<String>,
    /// Author signature
    pub signature: Signature,
    /// Seconds since the Unix epoch
    pub timestamp: Timestamp,
}

impl Transaction {
    /// Build from a stored payload
    pub fn from_payload(
        channel_id: ChannelId,
        position: Option<u64>,
        content_address: ContentAddress,
        payload: SignedPayload,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            channel_id,
            position,
            content_address,
            data: payload.data,
            encrypted_data: payload.encrypted_data,
            signature: payload.signature,
            timestamp,
        }
    }

    /// Identity kind of the signer
    pub fn identity_type(&self) -> IdentityType {
        self.signature.identity_type
    }

    /// Signature scheme
    pub fn signature_method(&self) -> SignatureMethod {
        self.signature.method
    }

    /// Check if confirmed
    pub fn is_confirmed(&self) -> bool {
        self.position.is_some()
    }
}
