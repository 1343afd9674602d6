//! Action failure taxonomy
//!
//! Nothing here ever reaches the host loop. The director logs the fault,
//! records it on the event bus and moves on to the next action.

use bevy::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceFault {
    /// Missing or invalid parameters, unknown action tag
    Authoring(String),
    /// Target string matched no live actor
    Unresolved(String),
    /// A suspension ran out of time and was force-completed
    Timeout(String),
    /// A collaborator could not provide what the action needs
    FatalSetup(String),
}

impl SequenceFault {
    pub fn missing(field: &str) -> Self {
        SequenceFault::Authoring(format!("missing '{}'", field))
    }

    pub fn unresolved(target: &str) -> Self {
        SequenceFault::Unresolved(target.to_string())
    }

    /// Log at the level the fault deserves
    pub fn log(&self, sequence: &str, cursor: usize, action: &str) {
        match self {
            SequenceFault::FatalSetup(_) => {
                error!("[{}#{}] {} skipped: {}", sequence, cursor, action, self)
            }
            _ => warn!("[{}#{}] {} skipped: {}", sequence, cursor, action, self),
        }
    }
}

impl std::fmt::Display for SequenceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceFault::Authoring(reason) => write!(f, "authoring error: {}", reason),
            SequenceFault::Unresolved(target) => write!(f, "no target matches '{}'", target),
            SequenceFault::Timeout(what) => write!(f, "timed out waiting for {}", what),
            SequenceFault::FatalSetup(reason) => write!(f, "setup failed: {}", reason),
        }
    }
}
