//! Error types for the race engine.

use std::fmt;

use crate::game_server::race::RacePhase;
use crate::game_server::timer::TimerKind;

#[derive(Debug, Clone, PartialEq)]
pub enum RaceError {
    /// Race start requested without a player or vehicle selected
    Precondition { missing: &'static str },
    /// Command not valid in the current phase
    InvalidPhase {
        action: &'static str,
        phase: RacePhase,
    },
    /// A timer fired after the phase it belonged to was left
    StaleTimer { kind: TimerKind },
    /// Simulation produced a corrupted state (NaN, out of bounds)
    InvariantViolation { detail: String },
    /// Level or engine configuration could not be read
    Config(String),
}

impl fmt::Display for RaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition { missing } => {
                write!(f, "cannot start race: no {missing} selected")
            }
            Self::InvalidPhase { action, phase } => {
                write!(f, "cannot {action} while race is {phase:?}")
            }
            Self::StaleTimer { kind } => write!(f, "stale {kind:?} timer discarded"),
            Self::InvariantViolation { detail } => {
                write!(f, "simulation invariant violated: {detail}")
            }
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for RaceError {}

impl From<serde_json::Error> for RaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failure reported by the session/leaderboard service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    Unavailable(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "session backend unavailable: {reason}"),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = RaceError::Precondition { missing: "vehicle" };
        assert_eq!(err.to_string(), "cannot start race: no vehicle selected");

        let err = RaceError::InvalidPhase {
            action: "retry",
            phase: RacePhase::Active,
        };
        assert_eq!(err.to_string(), "cannot retry while race is Active");

        let err = BackendError::Unavailable("timeout".into());
        assert_eq!(err.to_string(), "session backend unavailable: timeout");
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: RaceError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RaceError::Config(_)));
    }
}
