//! # reqnet-request
//!
//! Request state machine.
//!
//! A request has no stored state: it is derived on demand by replaying the
//! ordered transactions of its channel. Each transaction carries one action;
//! the protocol rules decide which state an action leads to, and actions
//! that are not valid from the current state are recorded and skipped.
//!
//! This crate provides:
//! - [`Action`](action::Action) - A decoded request action
//! - [`ProtocolRules`](rules::ProtocolRules) - Transition policy, with [`StandardRules`](rules::StandardRules)
//! - [`derive_state`](machine::derive_state) - Replay a channel into a [`Derivation`](machine::Derivation)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
mod error;
pub mod machine;
pub mod rules;

pub use action::{Action, ActionName};
pub use error::{RequestError, RequestResult};
pub use machine::{
    derive_state, AppliedAction, Derivation, RejectedTransaction, RequestState,
    RequestStateMachine,
};
pub use rules::{ProtocolRules, StandardRules};
