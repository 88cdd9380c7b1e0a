//! Sprint phase state machine
//!
//! `scheduled -> active -> voting -> retro -> completed`, with
//! `scheduled | active -> cancelled`. Completed and cancelled are terminal.

use crate::error::SprintError;
use crate::types::SprintStatus;
use sprint_store::RecordId;

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SprintStatus) -> &'static [SprintStatus] {
    use SprintStatus::*;
    match from {
        Scheduled => &[Active, Cancelled],
        Active => &[Voting, Cancelled],
        Voting => &[Retro],
        Retro => &[Completed],
        Completed | Cancelled => &[],
    }
}

/// Statuses from which `to` is reachable in one step
#[must_use]
pub fn predecessors(to: SprintStatus) -> Vec<SprintStatus> {
    SprintStatus::ALL
        .into_iter()
        .filter(|&from| can_transition(from, to))
        .collect()
}

/// Whether `from -> to` is a legal step
#[inline]
#[must_use]
pub fn can_transition(from: SprintStatus, to: SprintStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// The phase `end_sprint` advances to, if the sprint is in a running phase
#[inline]
#[must_use]
pub fn next_phase(from: SprintStatus) -> Option<SprintStatus> {
    match from {
        SprintStatus::Active => Some(SprintStatus::Voting),
        SprintStatus::Voting => Some(SprintStatus::Retro),
        SprintStatus::Retro => Some(SprintStatus::Completed),
        _ => None,
    }
}

/// Validate a step, reporting the actual status and the accepted ones
///
/// # Errors
/// [`SprintError::InvalidStateTransition`] when `from -> to` is illegal
pub fn validate_transition(
    sprint_id: &RecordId,
    from: SprintStatus,
    to: SprintStatus,
) -> Result<(), SprintError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(SprintError::InvalidStateTransition {
            sprint_id: sprint_id.clone(),
            actual: from,
            expected: predecessors(to),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use SprintStatus::*;

    fn status() -> impl Strategy<Value = SprintStatus> {
        prop_oneof![
            Just(Scheduled),
            Just(Active),
            Just(Voting),
            Just(Retro),
            Just(Completed),
            Just(Cancelled),
        ]
    }

    #[test]
    fn single_predecessor_for_forward_steps() {
        assert_eq!(predecessors(Active), vec![Scheduled]);
        assert_eq!(predecessors(Voting), vec![Active]);
        assert_eq!(predecessors(Retro), vec![Voting]);
        assert_eq!(predecessors(Completed), vec![Retro]);
        assert_eq!(predecessors(Cancelled), vec![Scheduled, Active]);
        assert!(predecessors(Scheduled).is_empty());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(allowed_transitions(Completed).is_empty());
        assert!(allowed_transitions(Cancelled).is_empty());
    }

    #[test]
    fn end_sprint_dispatch() {
        assert_eq!(next_phase(Active), Some(Voting));
        assert_eq!(next_phase(Voting), Some(Retro));
        assert_eq!(next_phase(Retro), Some(Completed));
        assert_eq!(next_phase(Scheduled), None);
        assert_eq!(next_phase(Completed), None);
    }

    proptest! {
        #[test]
        fn prop_validate_matches_table(from in status(), to in status()) {
            let id = RecordId::parse("s1").unwrap();
            let res = validate_transition(&id, from, to);
            prop_assert_eq!(res.is_ok(), allowed_transitions(from).contains(&to));
            if let Err(SprintError::InvalidStateTransition { actual, expected, .. }) = res {
                prop_assert_eq!(actual, from);
                prop_assert!(!expected.contains(&from));
            }
        }
    }
}
