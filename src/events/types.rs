//! Event type definitions for the sequence log

use serde::{Deserialize, Serialize};

use crate::stage::ActorKind;

/// What started a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartCause {
    /// A trigger predicate matched
    Trigger,
    /// A `triggerEvent` action chained into it
    Chain,
    /// `trigger_by_id` from host code
    Manual,
}

impl std::fmt::Display for StartCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartCause::Trigger => write!(f, "T"),
            StartCause::Chain => write!(f, "C"),
            StartCause::Manual => write!(f, "M"),
        }
    }
}

/// Everything the director reports while running sequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceEvent {
    // === Sequence lifecycle ===
    Started {
        sequence: String,
        run: u64,
        cause: StartCause,
    },
    /// Queue exhausted
    Completed {
        sequence: String,
        cursor: usize,
    },
    /// Ended early (level load, teardown)
    Abandoned {
        sequence: String,
        cursor: usize,
        reason: String,
    },
    /// Replaced by another sequence without returning to idle
    Chained {
        from: String,
        to: String,
    },

    // === Actions ===
    ActionDispatched {
        sequence: String,
        cursor: usize,
        action: String,
    },
    /// Cursor moved on; `cursor` is the new value
    Advanced {
        sequence: String,
        cursor: usize,
    },
    /// Action failed and was skipped
    ActionSkipped {
        sequence: String,
        cursor: usize,
        action: String,
        reason: String,
    },
    /// Suspension hit its safety timeout and was force-completed
    TimedOut {
        sequence: String,
        cursor: usize,
        action: String,
    },

    // === Stage requests ===
    LevelRequested {
        level: String,
    },
    ActorSpawned {
        actor: u64,
        kind: ActorKind,
        label: String,
    },
    ActorDestroyed {
        actor: u64,
        label: String,
    },
}

impl SequenceEvent {
    /// Get the event type code for compact serialization
    pub fn type_code(&self) -> &'static str {
        match self {
            SequenceEvent::Started { .. } => "SS",
            SequenceEvent::Completed { .. } => "SC",
            SequenceEvent::Abandoned { .. } => "SA",
            SequenceEvent::Chained { .. } => "CH",
            SequenceEvent::ActionDispatched { .. } => "AD",
            SequenceEvent::Advanced { .. } => "AV",
            SequenceEvent::ActionSkipped { .. } => "AK",
            SequenceEvent::TimedOut { .. } => "TO",
            SequenceEvent::LevelRequested { .. } => "LR",
            SequenceEvent::ActorSpawned { .. } => "SP",
            SequenceEvent::ActorDestroyed { .. } => "DS",
        }
    }

    /// Sequence the event belongs to, if any
    pub fn sequence(&self) -> Option<&str> {
        match self {
            SequenceEvent::Started { sequence, .. }
            | SequenceEvent::Completed { sequence, .. }
            | SequenceEvent::Abandoned { sequence, .. }
            | SequenceEvent::ActionDispatched { sequence, .. }
            | SequenceEvent::Advanced { sequence, .. }
            | SequenceEvent::ActionSkipped { sequence, .. }
            | SequenceEvent::TimedOut { sequence, .. } => Some(sequence),
            SequenceEvent::Chained { from, .. } => Some(from),
            _ => None,
        }
    }
}
