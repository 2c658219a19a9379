//! Common error types for primitives

use crate::hash::HashError;
use thiserror::Error;

/// Primitive parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Hash error
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Empty or malformed content address
    #[error("invalid content address: {0:?}")]
    InvalidContentAddress(String),
}
