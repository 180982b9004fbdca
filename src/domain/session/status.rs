//! SessionStatus enum for tracking one connection's participation in a room.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle status of a room session.
///
/// ```text
/// Joining ──► Active ──► Leaving ──► Closed
///    │                                  ▲
///    └──────────── (rejected) ──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Joining,
    Active,
    Leaving,
    Closed,
}

impl SessionStatus {
    /// Returns true while the session is registered in its room.
    pub fn is_registered(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Leaving)
    }
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (Joining, Active) | (Joining, Closed) | (Active, Leaving) | (Leaving, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionStatus::*;
        match self {
            Joining => vec![Active, Closed],
            Active => vec![Leaving],
            Leaving => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Joining => "Joining",
            SessionStatus::Active => "Active",
            SessionStatus::Leaving => "Leaving",
            SessionStatus::Closed => "Closed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_joining() {
        assert_eq!(SessionStatus::default(), SessionStatus::Joining);
    }

    #[test]
    fn happy_path_transitions_are_valid() {
        let status = SessionStatus::Joining
            .transition_to(SessionStatus::Active)
            .and_then(|s| s.transition_to(SessionStatus::Leaving))
            .and_then(|s| s.transition_to(SessionStatus::Closed));
        assert_eq!(status, Ok(SessionStatus::Closed));
    }

    #[test]
    fn rejected_join_closes_directly() {
        assert!(SessionStatus::Joining.can_transition_to(&SessionStatus::Closed));
    }

    #[test]
    fn active_cannot_skip_leaving() {
        assert!(SessionStatus::Active
            .transition_to(SessionStatus::Closed)
            .is_err());
    }

    #[test]
    fn closed_is_terminal() {
        assert!(SessionStatus::Closed.is_terminal());
        assert!(!SessionStatus::Leaving.is_terminal());
    }

    #[test]
    fn only_active_and_leaving_are_registered() {
        assert!(!SessionStatus::Joining.is_registered());
        assert!(SessionStatus::Active.is_registered());
        assert!(SessionStatus::Leaving.is_registered());
        assert!(!SessionStatus::Closed.is_registered());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            SessionStatus::Joining,
            SessionStatus::Active,
            SessionStatus::Leaving,
            SessionStatus::Closed,
        ] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }
}
