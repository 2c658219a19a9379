//! Transition policy

use crate::action::{Action, ActionName};
use crate::machine::RequestState;

/// Decides the state an action leads to.
///
/// Returns `None` when the action is not allowed from `current`; `current`
/// is `None` before the request exists. Closures with the same signature
/// implement this trait.
pub trait ProtocolRules {
    /// State after applying `action` in `current`
    fn transition_for(&self, current: Option<RequestState>, action: &Action) -> Option<RequestState>;
}

impl<F> ProtocolRules for F
where
    F: Fn(Option<RequestState>, &Action) -> Option<RequestState>,
{
    fn transition_for(&self, current: Option<RequestState>, action: &Action) -> Option<RequestState> {
        self(current, action)
    }
}

/// Request-logic rules of the request protocol.
///
/// | from \ action | create | accept | decline | cancel | amendments |
/// |---|---|---|---|---|---|
/// | none | Created | | | | |
/// | Created | | Accepted | Declined | Canceled | Created |
/// | Accepted | | | | Canceled | Accepted |
/// | Declined, Canceled | | | | | |
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl ProtocolRules for StandardRules {
    fn transition_for(&self, current: Option<RequestState>, action: &Action) -> Option<RequestState> {
        use RequestState::*;

        match (current, action.name) {
            (None, name) if name.is_creation() => Some(Created),
            (Some(Created), ActionName::Accept) => Some(Accepted),
            (Some(Created), ActionName::Decline) => Some(Declined),
            (Some(Created | Accepted), ActionName::Cancel) => Some(Canceled),
            (Some(state @ (Created | Accepted)), name) if name.is_amendment() => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ActionName; 8] = [
        ActionName::Create,
        ActionName::BroadcastSignedRequest,
        ActionName::Accept,
        ActionName::Decline,
        ActionName::Cancel,
        ActionName::ReduceExpectedAmount,
        ActionName::IncreaseExpectedAmount,
        ActionName::AddExtensionsData,
    ];

    fn next(current: Option<RequestState>, name: ActionName) -> Option<RequestState> {
        StandardRules.transition_for(current, &Action::new(name))
    }

    #[test]
    fn test_only_creation_starts_a_request() {
        for name in ALL {
            let expected = name.is_creation().then_some(RequestState::Created);
            assert_eq!(next(None, name), expected, "{}", name);
        }
    }

    #[test]
    fn test_created_transitions() {
        let created = Some(RequestState::Created);
        assert_eq!(next(created, ActionName::Accept), Some(RequestState::Accepted));
        assert_eq!(next(created, ActionName::Decline), Some(RequestState::Declined));
        assert_eq!(next(created, ActionName::Cancel), Some(RequestState::Canceled));
        assert_eq!(next(created, ActionName::ReduceExpectedAmount), created);
        assert_eq!(next(created, ActionName::Create), None);
    }

    #[test]
    fn test_accepted_transitions() {
        let accepted = Some(RequestState::Accepted);
        assert_eq!(next(accepted, ActionName::Accept), None);
        assert_eq!(next(accepted, ActionName::Decline), None);
        assert_eq!(next(accepted, ActionName::Cancel), Some(RequestState::Canceled));
        assert_eq!(next(accepted, ActionName::AddExtensionsData), accepted);
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for state in [RequestState::Declined, RequestState::Canceled] {
            for name in ALL {
                assert_eq!(next(Some(state), name), None, "{} from {}", name, state);
            }
        }
    }

    #[test]
    fn test_closure_rules() {
        let permissive = |_: Option<RequestState>, _: &Action| Some(RequestState::Accepted);
        assert_eq!(
            permissive.transition_for(None, &Action::new(ActionName::Cancel)),
            Some(RequestState::Accepted)
        );
    }
}
