//! Request actions carried by channel transactions

use crate::error::{RequestError, RequestResult};
use reqnet_types::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a request action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionName {
    /// Create the request
    Create,
    /// Create the request from a request signed by another party
    BroadcastSignedRequest,
    /// Payer accepts
    Accept,
    /// Payer declines
    Decline,
    /// Either party cancels
    Cancel,
    /// Payee lowers the expected amount
    ReduceExpectedAmount,
    /// Payer raises the expected amount
    IncreaseExpectedAmount,
    /// Attach extension data
    AddExtensionsData,
}

impl ActionName {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Create => "create",
            ActionName::BroadcastSignedRequest => "broadcastSignedRequest",
            ActionName::Accept => "accept",
            ActionName::Decline => "decline",
            ActionName::Cancel => "cancel",
            ActionName::ReduceExpectedAmount => "reduceExpectedAmount",
            ActionName::IncreaseExpectedAmount => "increaseExpectedAmount",
            ActionName::AddExtensionsData => "addExtensionsData",
        }
    }

    /// Check if the action creates a request
    pub fn is_creation(&self) -> bool {
        matches!(self, ActionName::Create | ActionName::BroadcastSignedRequest)
    }

    /// Check if the action amends a request without changing its state
    pub fn is_amendment(&self) -> bool {
        matches!(
            self,
            ActionName::ReduceExpectedAmount
                | ActionName::IncreaseExpectedAmount
                | ActionName::AddExtensionsData
        )
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action decoded from a transaction's clear payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action name
    pub name: ActionName,
    /// Action parameters, opaque to the state machine
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Request-logic version that produced the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Action {
    /// Create an action without parameters
    pub fn new(name: ActionName) -> Self {
        Self {
            name,
            parameters: serde_json::Value::Null,
            version: None,
        }
    }

    /// Set parameters
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Parse an action from its JSON encoding
    pub fn from_json(data: &str) -> RequestResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| RequestError::Undecodable(format!("invalid action: {}", e)))
    }

    /// JSON encoding, as stored in a transaction's `data`
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode the action of a transaction.
    ///
    /// Encrypted payloads cannot be read by the state machine.
    pub fn decode(transaction: &Transaction) -> RequestResult<Self> {
        match (&transaction.data, &transaction.encrypted_data) {
            (Some(data), _) => Self::from_json(data),
            (None, Some(_)) => Err(RequestError::Undecodable("payload is encrypted".into())),
            (None, None) => Err(RequestError::Undecodable("transaction has no payload".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqnet_primitives::{ChannelId, ContentAddress, H256};
    use reqnet_types::{IdentityType, Signature, SignatureMethod, SignedPayload};
    use serde_json::json;

    fn tx(payload: SignedPayload) -> Transaction {
        Transaction::from_payload(
            ChannelId::new(H256::from_bytes([1; 32])),
            Some(0),
            ContentAddress::new("QmAction").unwrap(),
            payload,
            1_700_000_000,
        )
    }

    fn sig() -> Signature {
        Signature::new(SignatureMethod::Ecdsa, IdentityType::EthereumAddress, "0xsig")
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActionName::BroadcastSignedRequest).unwrap(),
            "\"broadcastSignedRequest\""
        );
        assert_eq!(
            serde_json::from_str::<ActionName>("\"reduceExpectedAmount\"").unwrap(),
            ActionName::ReduceExpectedAmount
        );
        assert_eq!(ActionName::AddExtensionsData.to_string(), "addExtensionsData");
    }

    #[test]
    fn test_classification() {
        assert!(ActionName::Create.is_creation());
        assert!(ActionName::BroadcastSignedRequest.is_creation());
        assert!(!ActionName::Accept.is_creation());
        assert!(ActionName::IncreaseExpectedAmount.is_amendment());
        assert!(!ActionName::Cancel.is_amendment());
    }

    #[test]
    fn test_decode_clear_payload() {
        let data = r#"{"name":"accept","parameters":{"requestId":"0x01"},"version":"2.0.3"}"#;
        let action = Action::decode(&tx(SignedPayload::clear(data, sig()))).unwrap();
        assert_eq!(action.name, ActionName::Accept);
        assert_eq!(action.parameters, json!({"requestId": "0x01"}));
        assert_eq!(action.version.as_deref(), Some("2.0.3"));
    }

    #[test]
    fn test_parameters_default_to_null() {
        let action = Action::from_json(r#"{"name":"cancel"}"#).unwrap();
        assert_eq!(action, Action::new(ActionName::Cancel));
    }

    #[test]
    fn test_json_roundtrip_through_transaction() {
        let action = Action::new(ActionName::ReduceExpectedAmount)
            .with_parameters(json!({"deltaAmount": "1000"}));
        let decoded = Action::decode(&tx(SignedPayload::clear(action.to_json(), sig()))).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn test_undecodable_payloads() {
        let encrypted = tx(SignedPayload::encrypted("04abcdef", sig()));
        assert!(matches!(
            Action::decode(&encrypted),
            Err(RequestError::Undecodable(m)) if m.contains("encrypted")
        ));

        let unknown = tx(SignedPayload::clear(r#"{"name":"pay"}"#, sig()));
        assert!(matches!(Action::decode(&unknown), Err(RequestError::Undecodable(_))));

        let garbage = tx(SignedPayload::clear("not json", sig()));
        assert!(matches!(Action::decode(&garbage), Err(RequestError::Undecodable(_))));
    }
}
