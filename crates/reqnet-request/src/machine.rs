//! Replay of channel transactions into a request state

use crate::action::Action;
use crate::error::{RequestError, RequestResult};
use crate::rules::{ProtocolRules, StandardRules};
use reqnet_primitives::ContentAddress;
use reqnet_types::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// State of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Created, awaiting the payer
    Created,
    /// Accepted by the payer
    Accepted,
    /// Declined by the payer
    Declined,
    /// Canceled
    Canceled,
}

impl RequestState {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Created => "created",
            RequestState::Accepted => "accepted",
            RequestState::Declined => "declined",
            RequestState::Canceled => "canceled",
        }
    }

    /// Check if no further transition is possible under the standard rules
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Declined | RequestState::Canceled)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction whose action was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAction {
    /// Index in the replayed sequence
    pub index: usize,
    /// Position in the channel, `None` for pending transactions
    pub position: Option<u64>,
    /// Decoded action
    pub action: Action,
    /// State before
    pub from: Option<RequestState>,
    /// State after
    pub to: RequestState,
}

/// Transaction that left the state unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedTransaction {
    /// Index in the replayed sequence
    pub index: usize,
    /// Position in the channel, `None` for pending transactions
    pub position: Option<u64>,
    /// Address of the transaction's envelope
    pub content_address: ContentAddress,
    /// Why it was rejected
    pub error: RequestError,
}

/// Outcome of a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derivation {
    /// Final state, `None` if no transaction created the request
    pub state: Option<RequestState>,
    /// Applied actions in replay order
    pub applied: Vec<AppliedAction>,
    /// Rejected transactions in replay order
    pub rejected: Vec<RejectedTransaction>,
}

impl Derivation {
    /// Check if every transaction was applied
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Check a transition against the shape every request follows: it starts
/// as `Created` and never returns to `Created` from a later state.
fn is_well_formed(current: Option<RequestState>, next: RequestState) -> bool {
    match (current, next) {
        (None, next) => next == RequestState::Created,
        (Some(from), RequestState::Created) => from == RequestState::Created,
        (Some(_), _) => true,
    }
}

/// Decode `transaction` and look up the state it leads to from `current`
fn step<R: ProtocolRules + ?Sized>(
    rules: &R,
    current: Option<RequestState>,
    transaction: &Transaction,
) -> RequestResult<(Action, RequestState)> {
    let action = Action::decode(transaction)?;
    match rules.transition_for(current, &action) {
        Some(next) if is_well_formed(current, next) => Ok((action, next)),
        _ => Err(RequestError::InvalidTransition {
            from: current,
            action: action.name,
        }),
    }
}

/// Incremental replay of a channel.
///
/// Transactions are applied in the order given; a rejected transaction is
/// recorded and leaves the state unchanged.
#[derive(Debug, Clone)]
pub struct RequestStateMachine<R = StandardRules> {
    rules: R,
    derivation: Derivation,
}

impl Default for RequestStateMachine<StandardRules> {
    fn default() -> Self {
        Self::new(StandardRules)
    }
}

impl<R: ProtocolRules> RequestStateMachine<R> {
    /// Create a machine with no request
    pub fn new(rules: R) -> Self {
        Self {
            rules,
            derivation: Derivation::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> Option<RequestState> {
        self.derivation.state
    }

    /// Transactions replayed so far
    pub fn replayed(&self) -> usize {
        self.derivation.applied.len() + self.derivation.rejected.len()
    }

    /// Apply the next transaction.
    ///
    /// Returns the new state, or the reason the transaction was rejected.
    pub fn apply(&mut self, transaction: &Transaction) -> RequestResult<RequestState> {
        let index = self.replayed();
        let current = self.derivation.state;

        match step(&self.rules, current, transaction) {
            Ok((action, next)) => {
                debug!(index, action = %action.name, state = %next, "Applied request action");
                self.derivation.state = Some(next);
                self.derivation.applied.push(AppliedAction {
                    index,
                    position: transaction.position,
                    action,
                    from: current,
                    to: next,
                });
                Ok(next)
            }
            Err(error) => {
                warn!(
                    index,
                    content = %transaction.content_address,
                    error = %error,
                    "Rejected request transaction"
                );
                self.derivation.rejected.push(RejectedTransaction {
                    index,
                    position: transaction.position,
                    content_address: transaction.content_address.clone(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Apply transactions in order, ignoring rejections
    pub fn apply_all<'a>(&mut self, transactions: impl IntoIterator<Item = &'a Transaction>) {
        for transaction in transactions {
            let _ = self.apply(transaction);
        }
    }

    /// Finish the replay
    pub fn into_derivation(self) -> Derivation {
        self.derivation
    }
}

/// Replay `transactions` in order through `rules`.
///
/// Never fails: undecodable transactions and invalid transitions are
/// recorded in [`Derivation::rejected`].
pub fn derive_state<R: ProtocolRules + ?Sized>(transactions: &[Transaction], rules: &R) -> Derivation {
    let mut machine = RequestStateMachine::new(Borrowed(rules));
    machine.apply_all(transactions);
    machine.into_derivation()
}

/// Rules held by reference
struct Borrowed<'a, R: ?Sized>(&'a R);

impl<R: ProtocolRules + ?Sized> ProtocolRules for Borrowed<'_, R> {
    fn transition_for(&self, current: Option<RequestState>, action: &Action) -> Option<RequestState> {
        self.0.transition_for(current, action)
    }
}
