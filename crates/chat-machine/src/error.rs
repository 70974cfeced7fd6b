use std::fmt;

use thiserror::Error;

/// Which lifecycle callback a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Enter => write!(f, "on_enter"),
            Phase::Update => write!(f, "on_update"),
            Phase::Exit => write!(f, "on_exit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MachineError {
    /// A state callback returned an error. `source` is the callback's own error, untouched.
    #[error("state `{state}` failed in {phase} for session `{session}`: {source}")]
    Callback {
        session: String,
        state: String,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("session `{session}` exceeded {limit} chained transitions in one turn")]
    TransitionChainExceeded { session: String, limit: usize },

    #[error("invalid machine configuration: {0}")]
    InvalidConfig(String),
}

impl MachineError {
    /// The application error behind a callback failure, if that is what this is.
    pub fn fault(&self) -> Option<&anyhow::Error> {
        match self {
            MachineError::Callback { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn into_fault(self) -> Option<anyhow::Error> {
        match self {
            MachineError::Callback { source, .. } => Some(source),
            _ => None,
        }
    }
}
