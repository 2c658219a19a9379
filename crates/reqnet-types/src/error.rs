//! Error types for envelopes and registries

use thiserror::Error;

/// Types error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Bytes are not a JSON envelope
    #[error("impossible to JSON parse the envelope: {0}")]
    Json(String),

    /// Envelope version is not supported
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(String),

    /// Transaction carries neither clear nor encrypted data
    #[error("transaction has neither data nor encrypted data")]
    MissingPayload,

    /// Envelope belongs to another channel
    #[error("envelope channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch {
        /// Channel being read
        expected: String,
        /// Channel found in the envelope
        got: String,
    },

    /// Chain registered twice
    #[error("duplicate chain: {0}")]
    DuplicateChain(String),

    /// Chain not in the registry
    #[error("unknown chain: {0}")]
    UnknownChain(String),
}

/// Result type for type operations
pub type TypesResult<T> = Result<T, TypesError>;
