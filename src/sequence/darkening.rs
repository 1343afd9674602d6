//! Cinematic darkening
//!
//! While a dialogue-bearing sequence runs, background combatants are tinted
//! and faded, and the player and story extras are lifted above the dialogue
//! box. The effect keeps every actor's original appearance in its own map
//! and puts them all back on revert.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::settings::SequencerSettings;
use crate::stage::{ActorId, Appearance, Stage};

#[derive(Debug, Default)]
pub struct CinematicDarkening {
    originals: HashMap<ActorId, Appearance>,
    active: bool,
}

impl CinematicDarkening {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Actors whose appearance is currently overridden
    pub fn tracked(&self) -> usize {
        self.originals.len()
    }

    pub fn is_tracking(&self, id: ActorId) -> bool {
        self.originals.contains_key(&id)
    }

    /// Start the effect (no-op if already running)
    pub fn activate(&mut self, stage: &mut Stage, settings: &SequencerSettings) {
        if self.active {
            return;
        }
        self.active = true;
        debug!("Cinematic darkening on");
        self.reassert(stage, settings);
    }

    /// Re-apply the look: catches actors spawned since activation and undoes
    /// anything that re-tinted the highlighted set
    pub fn reassert(&mut self, stage: &mut Stage, settings: &SequencerSettings) {
        if !self.active {
            return;
        }
        let dim_tint = settings.darken_color();
        let dim_alpha = settings.darken_alpha;
        let highlight_depth = settings.highlight_depth();

        for actor in stage.registry.iter_mut() {
            if !actor.is_live() {
                continue;
            }
            self.originals.entry(actor.id).or_insert(actor.appearance);
            if actor.kind.is_combatant() {
                actor.appearance.tint = dim_tint;
                actor.appearance.alpha = dim_alpha;
            } else {
                actor.appearance.tint = Color::WHITE;
                actor.appearance.alpha = 1.0;
                actor.appearance.depth = highlight_depth;
            }
        }
    }

    /// Restore every original appearance and stop tracking
    pub fn revert(&mut self, stage: &mut Stage) {
        if !self.active && self.originals.is_empty() {
            return;
        }
        for (id, original) in self.originals.drain() {
            if let Some(actor) = stage.registry.get_mut(id) {
                actor.appearance = original;
            }
        }
        self.active = false;
        debug!("Cinematic darkening off");
    }

    pub fn forget(&mut self, id: ActorId) {
        self.originals.remove(&id);
    }
}
