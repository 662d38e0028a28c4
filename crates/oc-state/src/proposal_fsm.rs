//! The proposal state machine observed by the stream handler (spec §4.7):
//!
//! ```text
//!         +-- EditLock <--+
//!         |               |
//! Submitted -> Closed
//!         |      ^
//!         +--> Paused
//! ```
//!
//! `Closed` and `Paused` are terminal. `EditLock` is transient: a new
//! submission (`ProposalEvent::Resubmit`) leaves it and returns to
//! `Submitted`.

use oc_schemas::ProposalStatus;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalEvent {
    Submit,
    Resubmit,
    Close,
    Pause,
    EditLock,
    ProposalLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ProposalStatus,
    pub event: ProposalEvent,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot apply {:?} from state {:?}", self.event, self.from)
    }
}

impl std::error::Error for TransitionError {}

/// Pure transition function; callers are responsible for persisting the
/// result (C11) and for idempotent replay at the HTTP/RPC boundary.
pub fn transition(
    from: ProposalStatus,
    event: ProposalEvent,
) -> Result<ProposalStatus, TransitionError> {
    use ProposalStatus as S;

    match (from, event) {
        (S::Submitted, ProposalEvent::Close) => Ok(S::Closed),
        (S::Submitted, ProposalEvent::Pause) => Ok(S::Paused),
        (S::Submitted, ProposalEvent::EditLock) => Ok(S::EditLock),
        (S::Submitted, ProposalEvent::ProposalLock) => Ok(S::ProposalLock),
        (S::Submitted, ProposalEvent::Submit) => Ok(S::Submitted),

        (S::EditLock, ProposalEvent::Resubmit) => Ok(S::Submitted),
        (S::EditLock, ProposalEvent::Close) => Ok(S::Closed),
        (S::EditLock, ProposalEvent::Pause) => Ok(S::Paused),

        (S::ProposalLock, ProposalEvent::Resubmit) => Ok(S::Submitted),
        (S::ProposalLock, ProposalEvent::Close) => Ok(S::Closed),
        (S::ProposalLock, ProposalEvent::Pause) => Ok(S::Paused),

        (from, event) => Err(TransitionError { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_can_close_or_pause_or_lock() {
        assert_eq!(
            transition(ProposalStatus::Submitted, ProposalEvent::Close),
            Ok(ProposalStatus::Closed)
        );
        assert_eq!(
            transition(ProposalStatus::Submitted, ProposalEvent::Pause),
            Ok(ProposalStatus::Paused)
        );
        assert_eq!(
            transition(ProposalStatus::Submitted, ProposalEvent::EditLock),
            Ok(ProposalStatus::EditLock)
        );
    }

    #[test]
    fn editlock_is_transient() {
        assert_eq!(
            transition(ProposalStatus::EditLock, ProposalEvent::Resubmit),
            Ok(ProposalStatus::Submitted)
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        assert!(transition(ProposalStatus::Closed, ProposalEvent::Submit).is_err());
        assert!(transition(ProposalStatus::Paused, ProposalEvent::EditLock).is_err());
    }
}
