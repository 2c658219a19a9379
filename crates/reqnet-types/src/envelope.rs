//! Envelope: the unit stored in content-addressed storage
//!
//! An envelope wraps one signed transaction with the channel it belongs to
//! and the topics the channel is indexed under. Its JSON encoding is what
//! the content store holds and what the content hash is computed over.

use crate::error::{TypesError, TypesResult};
use crate::transaction::SignedPayload;
use bytes::Bytes;
use reqnet_crypto::keccak256;
use reqnet_primitives::{ChannelId, Topic, H256};
use serde::{Deserialize, Serialize};

/// Supported envelope format version
pub const ENVELOPE_VERSION: &str = "0.1.0";

/// Stored envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Format version
    pub version: String,
    /// Channel of the transaction
    pub channel_id: ChannelId,
    /// Topics of the channel
    #[serde(default)]
    pub topics: Vec<Topic>,
    /// Signed transaction
    pub transaction: SignedPayload,
}

impl Envelope {
    /// Create an envelope at the current version
    pub fn new(channel_id: ChannelId, topics: Vec<Topic>, transaction: SignedPayload) -> TypesResult<Self> {
        if !transaction.has_payload() {
            return Err(TypesError::MissingPayload);
        }
        Ok(Self {
            version: ENVELOPE_VERSION.to_string(),
            channel_id,
            topics,
            transaction,
        })
    }

    /// Encode to the stored JSON bytes
    pub fn encode(&self) -> TypesResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TypesError::Json(e.to_string()))
    }

    /// Keccak-256 of the encoded envelope
    pub fn content_hash(&self) -> TypesResult<H256> {
        Ok(keccak256(&self.encode()?))
    }

    /// Parse stored bytes read for `expected_channel`
    pub fn parse(data: &[u8], expected_channel: &ChannelId) -> TypesResult<Self> {
        let envelope: Envelope =
            serde_json::from_slice(data).map_err(|e| TypesError::Json(e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(TypesError::UnsupportedVersion(envelope.version));
        }
        if !envelope.transaction.has_payload() {
            return Err(TypesError::MissingPayload);
        }
        if &envelope.channel_id != expected_channel {
            return Err(TypesError::ChannelMismatch {
                expected: expected_channel.to_hex(),
                got: envelope.channel_id.to_hex(),
            });
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{IdentityType, Signature, SignatureMethod};

    fn channel(byte: u8) -> ChannelId {
        ChannelId::new(H256::from_bytes([byte; 32]))
    }

    fn payload() -> SignedPayload {
        SignedPayload::clear(
            r#"{"name":"create","parameters":{"expectedAmount":"100"}}"#,
            Signature::new(SignatureMethod::Ecdsa, IdentityType::EthereumAddress, "0x01"),
        )
    }

    #[test]
    fn test_new_rejects_empty_payload() {
        let mut p = payload();
        p.data = None;
        assert_eq!(Envelope::new(channel(1), vec![], p), Err(TypesError::MissingPayload));
    }

    #[test]
    fn test_parse_encoded() {
        let topic = Topic::new(H256::from_bytes([9; 32]));
        let envelope = Envelope::new(channel(1), vec![topic], payload()).unwrap();
        let bytes = envelope.encode().unwrap();
        let parsed = Envelope::parse(&bytes, &channel(1)).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = Envelope::new(channel(1), vec![], payload()).unwrap();
        let b = Envelope::new(channel(1), vec![], payload()).unwrap();
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());

        let other = Envelope::new(channel(2), vec![], payload()).unwrap();
        assert_ne!(a.content_hash().unwrap(), other.content_hash().unwrap());
    }

    #[test]
    fn test_parse_not_json() {
        let result = Envelope::parse(b"broken transaction", &channel(1));
        assert!(matches!(result, Err(TypesError::Json(_))));
    }

    #[test]
    fn test_parse_wrong_version() {
        let mut envelope = Envelope::new(channel(1), vec![], payload()).unwrap();
        envelope.version = "0.0.1".to_string();
        let bytes = serde_json::to_vec(&envelope).unwrap();
        assert_eq!(
            Envelope::parse(&bytes, &channel(1)),
            Err(TypesError::UnsupportedVersion("0.0.1".to_string()))
        );
    }

    #[test]
    fn test_parse_missing_payload() {
        let json = format!(
            r#"{{"version":"0.1.0","channelId":"{}","topics":[],"transaction":{{"signature":{{"method":"ecdsa","identityType":"ethereumAddress","value":"0x"}}}}}}"#,
            channel(1).to_hex()
        );
        assert_eq!(
            Envelope::parse(json.as_bytes(), &channel(1)),
            Err(TypesError::MissingPayload)
        );
    }

    #[test]
    fn test_parse_other_channel() {
        let bytes = Envelope::new(channel(1), vec![], payload()).unwrap().encode().unwrap();
        let result = Envelope::parse(&bytes, &channel(2));
        assert!(matches!(result, Err(TypesError::ChannelMismatch { .. })));
    }
}
