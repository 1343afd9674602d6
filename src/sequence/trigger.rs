//! Trigger evaluation - which sequence (if any) starts this tick

use bevy::prelude::*;
use std::collections::HashSet;

use super::definition::{SequenceDefinition, TriggerKind, TriggerSpec};
use crate::settings::SequencerSettings;
use crate::stage::{Stage, WorldBounds};

/// World state a trigger predicate looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerInput {
    pub player_x: f32,
    pub world: WorldBounds,
    pub camera_right: f32,
}

impl TriggerInput {
    /// None when there is no live player
    pub fn from_stage(stage: &Stage) -> Option<Self> {
        Some(Self {
            player_x: stage.player_x()?,
            world: stage.world,
            camera_right: stage.camera.right_edge(),
        })
    }
}

/// Evaluate one predicate. Unknown kinds never match.
pub fn trigger_matches(trigger: &TriggerSpec, input: &TriggerInput, settings: &SequencerSettings) -> bool {
    match &trigger.kind {
        TriggerKind::Position => {
            let tolerance = trigger.tolerance.unwrap_or(settings.position_tolerance);
            (input.player_x - trigger.value).abs() <= tolerance
        }
        TriggerKind::Percentage => {
            if input.world.width <= 0.0 {
                return false;
            }
            let tolerance = trigger.tolerance.unwrap_or(settings.percentage_tolerance);
            let progress = (input.player_x - input.world.x) / input.world.width;
            (progress - trigger.value).abs() <= tolerance
        }
        TriggerKind::CameraAtEnd => {
            let tolerance = trigger.tolerance.unwrap_or(settings.camera_end_tolerance);
            input.camera_right >= input.world.right() - tolerance
        }
        TriggerKind::Unknown(_) => false,
    }
}

/// Tracks which sequences have fired.
///
/// Once-only sequences fire a single time per level. Repeatable ones are
/// edge-triggered: after firing they stay latched until their predicate
/// goes false, so standing still on a trigger does not loop the sequence.
#[derive(Debug, Default)]
pub struct TriggerEvaluator {
    fired: HashSet<String>,
    latched: HashSet<String>,
    warned: HashSet<String>,
}

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// First sequence whose trigger matches, in registration order
    pub fn evaluate<'a>(
        &mut self,
        sequences: &'a [SequenceDefinition],
        input: &TriggerInput,
        settings: &SequencerSettings,
    ) -> Option<&'a SequenceDefinition> {
        for sequence in sequences {
            let Some(trigger) = &sequence.trigger else {
                continue;
            };
            if trigger.once && self.fired.contains(&sequence.id) {
                continue;
            }

            if let TriggerKind::Unknown(kind) = &trigger.kind {
                if self.warned.insert(sequence.id.clone()) {
                    warn!("Sequence '{}' has unknown trigger type '{}', ignoring", sequence.id, kind);
                }
                continue;
            }

            let matched = trigger_matches(trigger, input, settings);
            if !trigger.once {
                if !matched {
                    self.latched.remove(&sequence.id);
                    continue;
                }
                if self.latched.contains(&sequence.id) {
                    continue;
                }
            }
            if matched {
                return Some(sequence);
            }
        }
        None
    }

    /// Record a start, however it happened
    pub fn mark_fired(&mut self, sequence: &SequenceDefinition) {
        if sequence.is_once() {
            self.fired.insert(sequence.id.clone());
        } else {
            self.latched.insert(sequence.id.clone());
        }
    }

    pub fn has_fired(&self, id: &str) -> bool {
        self.fired.contains(id)
    }

    pub fn reset(&mut self) {
        self.fired.clear();
        self.latched.clear();
        self.warned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(player_x: f32, width: f32) -> TriggerInput {
        TriggerInput {
            player_x,
            world: WorldBounds::new(0.0, 0.0, width, 600.0),
            camera_right: 800.0,
        }
    }

    #[test]
    fn test_position_boundary_is_inclusive() {
        let settings = SequencerSettings::default();
        let mut trigger = TriggerSpec::new(TriggerKind::Position, 1000.0);
        trigger.tolerance = Some(50.0);

        assert!(trigger_matches(&trigger, &input(950.0, 4000.0), &settings));
        assert!(trigger_matches(&trigger, &input(1000.0, 4000.0), &settings));
        assert!(trigger_matches(&trigger, &input(1050.0, 4000.0), &settings));
        assert!(!trigger_matches(&trigger, &input(1050.01, 4000.0), &settings));
        assert!(!trigger_matches(&trigger, &input(949.9, 4000.0), &settings));
    }

    #[test]
    fn test_percentage_trigger() {
        let settings = SequencerSettings::default();
        let mut trigger = TriggerSpec::new(TriggerKind::Percentage, 0.5);
        trigger.tolerance = Some(0.02);

        assert!(trigger_matches(&trigger, &input(1010.0, 2000.0), &settings));
        assert!(!trigger_matches(&trigger, &input(950.0, 2000.0), &settings));
        assert!(!trigger_matches(&trigger, &input(1000.0, 0.0), &settings));
    }

    #[test]
    fn test_camera_at_end() {
        let settings = SequencerSettings::default();
        let trigger = TriggerSpec::new(TriggerKind::CameraAtEnd, 0.0);
        let mut at_end = input(0.0, 2000.0);
        at_end.camera_right = 1990.0;
        assert!(trigger_matches(&trigger, &at_end, &settings));
        at_end.camera_right = 1989.0;
        assert!(!trigger_matches(&trigger, &at_end, &settings));
    }

    #[test]
    fn test_once_sequences_fire_once() {
        let settings = SequencerSettings::default();
        let sequences = vec![SequenceDefinition::new(
            "gate",
            Some(TriggerSpec::new(TriggerKind::Position, 500.0)),
            vec![],
        )];
        let mut evaluator = TriggerEvaluator::new();
        let hit = evaluator.evaluate(&sequences, &input(500.0, 4000.0), &settings).unwrap();
        evaluator.mark_fired(hit);
        assert!(evaluator.evaluate(&sequences, &input(500.0, 4000.0), &settings).is_none());
        assert!(evaluator.has_fired("gate"));
    }

    #[test]
    fn test_repeatable_sequences_rearm_after_leaving() {
        let settings = SequencerSettings::default();
        let mut trigger = TriggerSpec::new(TriggerKind::Position, 500.0);
        trigger.once = false;
        let sequences = vec![SequenceDefinition::new("bell", Some(trigger), vec![])];
        let mut evaluator = TriggerEvaluator::new();

        let hit = evaluator.evaluate(&sequences, &input(500.0, 4000.0), &settings).unwrap();
        evaluator.mark_fired(hit);
        assert!(evaluator.evaluate(&sequences, &input(510.0, 4000.0), &settings).is_none());
        assert!(evaluator.evaluate(&sequences, &input(900.0, 4000.0), &settings).is_none());
        assert!(evaluator.evaluate(&sequences, &input(500.0, 4000.0), &settings).is_some());
    }

    #[test]
    fn test_unknown_kind_never_matches() {
        let settings = SequencerSettings::default();
        let sequences = vec![
            SequenceDefinition::new(
                "odd",
                Some(TriggerSpec::new(TriggerKind::Unknown("bossHealth".into()), 0.0)),
                vec![],
            ),
            SequenceDefinition::new("fallback", Some(TriggerSpec::new(TriggerKind::Position, 0.0)), vec![]),
        ];
        let mut evaluator = TriggerEvaluator::new();
        let hit = evaluator.evaluate(&sequences, &input(0.0, 4000.0), &settings).unwrap();
        assert_eq!(hit.id, "fallback");
    }
}
