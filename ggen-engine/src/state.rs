//! Engine lifecycle state machine
//!
//! `Uninitialized → Initializing → Ready ↔ Busy → ShuttingDown → Shutdown`;
//! any terminal failure lands in `Error` and subsequent operations return
//! `engine-not-ready`.

use serde::{Deserialize, Serialize};

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Busy,
    ShuttingDown,
    Shutdown,
    Error,
}

impl EngineState {
    /// Whether operations may start in this state
    pub fn accepts_operations(&self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Busy)
    }

    /// Whether the transition is part of the machine
    pub fn can_transition_to(&self, next: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Error)
                | (Ready, Busy)
                | (Busy, Ready)
                | (Ready, ShuttingDown)
                | (Busy, ShuttingDown)
                | (ShuttingDown, Shutdown)
                | (Ready, Error)
                | (Busy, Error)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use EngineState::*;
        assert!(Uninitialized.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Busy));
        assert!(Busy.can_transition_to(Ready));
        assert!(Ready.can_transition_to(ShuttingDown));
        assert!(ShuttingDown.can_transition_to(Shutdown));
    }

    #[test]
    fn test_invalid_transitions() {
        use EngineState::*;
        assert!(!Uninitialized.can_transition_to(Ready));
        assert!(!Shutdown.can_transition_to(Ready));
        assert!(!Error.can_transition_to(Ready));
    }

    #[test]
    fn test_operation_acceptance() {
        assert!(EngineState::Ready.accepts_operations());
        assert!(EngineState::Busy.accepts_operations());
        assert!(!EngineState::Uninitialized.accepts_operations());
        assert!(!EngineState::Error.accepts_operations());
    }
}
