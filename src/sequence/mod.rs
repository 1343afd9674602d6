//! Scripted sequences: authoring format, trigger evaluation and the director
//! that runs them against the stage

mod actions;
mod darkening;
mod database;
mod definition;
mod director;
mod fault;
mod pause;
mod trigger;

pub use darkening::CinematicDarkening;
pub use database::SequenceDatabase;
pub use definition::*;
pub use director::{
    ActionTicket, Callback, RunOutcome, RunSummary, RuntimeSequence, SequenceDirector, SpawnLoop, Suspension,
    WaitCondition,
};
pub use fault::SequenceFault;
pub use pause::{PauseCoordinator, PausedActorSnapshot};
pub use trigger::{TriggerEvaluator, TriggerInput, trigger_matches};
