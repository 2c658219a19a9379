//! Request state errors

use crate::action::ActionName;
use crate::machine::RequestState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a transaction did not change the request state
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestError {
    /// Action not allowed from the current state
    #[error("invalid transition: {action} from {}", state_name(.from))]
    InvalidTransition {
        /// State before the action
        from: Option<RequestState>,
        /// Rejected action
        action: ActionName,
    },

    /// Payload is not a readable action
    #[error("undecodable transaction: {0}")]
    Undecodable(String),
}

fn state_name(state: &Option<RequestState>) -> &'static str {
    state.map_or("no request", RequestState::as_str)
}

/// Result type for request operations
pub type RequestResult<T> = Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RequestError::InvalidTransition {
            from: Some(RequestState::Accepted),
            action: ActionName::Accept,
        };
        assert_eq!(err.to_string(), "invalid transition: accept from accepted");

        let err = RequestError::InvalidTransition {
            from: None,
            action: ActionName::Cancel,
        };
        assert_eq!(err.to_string(), "invalid transition: cancel from no request");

        let err = RequestError::Undecodable("payload is encrypted".into());
        assert!(err.to_string().contains("encrypted"));
    }
}
