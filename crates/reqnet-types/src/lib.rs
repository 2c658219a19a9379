//! # reqnet-types
//!
//! Core types of the request data-access layer.
//!
//! This crate provides:
//! - [`Transaction`](transaction::Transaction) - A channel transaction as returned by reads
//! - [`Envelope`](envelope::Envelope) - The bytes written to content-addressed storage
//! - [`ChainRegistry`](chain::ChainRegistry) - Immutable lookup of supported anchoring chains

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod envelope;
mod error;
pub mod transaction;

// Re-export commonly used types
pub use chain::{ChainRegistry, ChainSpec, EvmChain, NamedChain};
pub use envelope::{Envelope, ENVELOPE_VERSION};
pub use error::{TypesError, TypesResult};
pub use transaction::{IdentityType, Signature, SignatureMethod, SignedPayload, Transaction};
