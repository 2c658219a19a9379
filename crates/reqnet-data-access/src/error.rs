//! Data-access error types
//!
//! Collaborators report a [`CollaboratorError`] tagged with an [`ErrorKind`];
//! callers match on the kind, never on a concrete type. Core operations
//! report a [`DataAccessError`], which classifies into a [`FailureKind`].

use reqnet_pending::PendingError;
use reqnet_types::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of a collaborator failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Unreachable, timed out or transiently failing
    Connection,
    /// Requested content does not exist
    NotFound,
    /// Data is malformed or does not match its address
    Corrupt,
    /// Refused by the chain
    Rejected,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed when retried
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connection)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::NotFound => "not found",
            ErrorKind::Corrupt => "corrupt",
            ErrorKind::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Failure reported by a content store, anchor or indexer
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CollaboratorError {
    /// Failure kind
    pub kind: ErrorKind,
    /// Description
    pub message: String,
}

impl CollaboratorError {
    /// Create an error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Connection failure
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Missing content
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Corrupt data
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt, message)
    }

    /// Rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    /// Whether retrying may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<TypesError> for CollaboratorError {
    fn from(e: TypesError) -> Self {
        CollaboratorError::corrupt(e.to_string())
    }
}

/// Failure taxonomy of core operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A collaborator could not be reached
    Connection,
    /// Stored or indexed data is unusable
    DataCorruption,
    /// The chain refused the operation
    Rejection,
    /// Caller error or local state conflict
    Logic,
}

/// Data-access errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataAccessError {
    /// Content could not be stored
    #[error("content storage failed: {0}")]
    Storage(CollaboratorError),

    /// The chain refused the anchor
    #[error("anchor rejected: {0}")]
    AnchorRejected(String),

    /// Retries exhausted against the anchor
    #[error("{collaborator} unavailable after {attempts} attempts: {last}")]
    Unavailable {
        /// Collaborator name
        collaborator: &'static str,
        /// Attempts made
        attempts: u32,
        /// Last failure
        last: CollaboratorError,
    },

    /// Data returned by a collaborator is unusable
    #[error("bad data: {0}")]
    BadData(String),

    /// The indexer could not be queried
    #[error("index unavailable: {0}")]
    IndexUnavailable(CollaboratorError),

    /// Request could not be turned into an envelope
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] TypesError),

    /// Pending store refused the entry
    #[error("pending store: {0}")]
    Pending(#[from] PendingError),

    /// Operation cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),
}

impl DataAccessError {
    /// Classify the error
    pub fn kind(&self) -> FailureKind {
        match self {
            DataAccessError::Storage(e) | DataAccessError::IndexUnavailable(e) => match e.kind {
                ErrorKind::Connection => FailureKind::Connection,
                ErrorKind::NotFound | ErrorKind::Corrupt => FailureKind::DataCorruption,
                ErrorKind::Rejected => FailureKind::Rejection,
            },
            DataAccessError::Unavailable { .. } => FailureKind::Connection,
            DataAccessError::AnchorRejected(_) => FailureKind::Rejection,
            DataAccessError::BadData(_) => FailureKind::DataCorruption,
            DataAccessError::InvalidRequest(_)
            | DataAccessError::Pending(_)
            | DataAccessError::Cancelled
            | DataAccessError::Config(_) => FailureKind::Logic,
        }
    }
}

/// Result type for data-access operations
pub type DataAccessResult<T> = Result<T, DataAccessError>;
