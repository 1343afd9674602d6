//! Brawler Events - scripted event sequencer for a side-scrolling brawler
//!
//! Level designers describe cutscenes and encounters as JSON sequences of
//! actions. The director fires them from player/camera triggers and runs
//! their actions one at a time against an explicit `Stage`.

pub mod config_watcher;
pub mod constants;
pub mod events;
pub mod plugin;
pub mod sequence;
pub mod settings;
pub mod stage;
pub mod testing;

pub use config_watcher::SequenceFileWatcher;
pub use constants::*;
pub use events::{BusEvent, SequenceEvent, SequenceEventBus, StartCause};
pub use plugin::{ActorSprite, CurrentLevel, SequencerPlugin};
pub use sequence::{
    ActionSpec, RunOutcome, SequenceDatabase, SequenceDefinition, SequenceDirector, SequenceFault,
};
pub use settings::SequencerSettings;
pub use stage::{Actor, ActorId, ActorKind, Stage};
