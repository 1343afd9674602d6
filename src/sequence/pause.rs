//! Pause/resume coordinator
//!
//! Freezes actors for cutscenes and puts them back exactly as they were.
//! One snapshot per paused actor; pausing twice keeps the first snapshot,
//! resuming an actor that was never paused does nothing.

use bevy::prelude::*;
use std::collections::HashMap;

use super::definition::PauseTarget;
use super::fault::SequenceFault;
use crate::stage::{ActorId, ActorKind, AnimState, Stage};

/// State captured when an actor is paused
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PausedActorSnapshot {
    pub velocity: Vec2,
    pub gravity: f32,
    pub anim: AnimState,
    pub ai_enabled: bool,
}

#[derive(Debug, Default)]
pub struct PauseCoordinator {
    snapshots: HashMap<ActorId, PausedActorSnapshot>,
}

impl PauseCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self, id: ActorId) -> bool {
        self.snapshots.contains_key(&id)
    }

    pub fn paused_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn snapshot(&self, id: ActorId) -> Option<&PausedActorSnapshot> {
        self.snapshots.get(&id)
    }

    /// Freeze an actor. Returns false if it was already paused or is gone.
    pub fn pause(&mut self, stage: &mut Stage, id: ActorId) -> bool {
        if self.snapshots.contains_key(&id) {
            return false;
        }
        let Some(actor) = stage.registry.get_mut(id).filter(|a| a.is_live()) else {
            return false;
        };

        self.snapshots.insert(
            id,
            PausedActorSnapshot {
                velocity: actor.velocity,
                gravity: actor.gravity,
                anim: actor.anim,
                ai_enabled: actor.ai_enabled,
            },
        );
        actor.velocity = Vec2::ZERO;
        actor.gravity = 0.0;
        actor.ai_enabled = false;

        if actor.kind == ActorKind::Player {
            actor.attack_locked = false;
            actor.anim = AnimState::Idle;
            stage.input_enabled = false;
        }
        true
    }

    /// Restore a paused actor. Returns false if it was not paused.
    pub fn resume(&mut self, stage: &mut Stage, id: ActorId) -> bool {
        let Some(snapshot) = self.snapshots.remove(&id) else {
            return false;
        };
        let Some(actor) = stage.registry.get_mut(id).filter(|a| a.is_live()) else {
            debug!("Dropped pause snapshot of vanished actor {}", id);
            return false;
        };

        actor.velocity = snapshot.velocity;
        actor.gravity = snapshot.gravity;
        actor.ai_enabled = snapshot.ai_enabled;
        actor.anim = if snapshot.anim.is_transient() {
            AnimState::Idle
        } else {
            snapshot.anim
        };

        if actor.kind == ActorKind::Player {
            stage.input_enabled = true;
        }
        true
    }

    /// Pause every live enemy and boss. Returns the ones newly paused.
    pub fn pause_all_enemies(&mut self, stage: &mut Stage) -> Vec<ActorId> {
        stage
            .registry
            .combatant_ids()
            .into_iter()
            .filter(|id| self.pause(stage, *id))
            .collect()
    }

    /// Resume everything still paused
    pub fn resume_all(&mut self, stage: &mut Stage) -> usize {
        let ids: Vec<ActorId> = self.snapshots.keys().copied().collect();
        ids.into_iter().filter(|id| self.resume(stage, *id)).count()
    }

    /// Pause a `pause` action's target subset; returns how many were newly paused
    pub fn pause_target(&mut self, stage: &mut Stage, target: &PauseTarget) -> Result<usize, SequenceFault> {
        let ids = Self::target_ids(stage, target)?;
        Ok(ids.into_iter().filter(|id| self.pause(stage, *id)).count())
    }

    pub fn resume_target(&mut self, stage: &mut Stage, target: &PauseTarget) -> Result<usize, SequenceFault> {
        let ids = Self::target_ids(stage, target)?;
        Ok(ids.into_iter().filter(|id| self.resume(stage, *id)).count())
    }

    fn target_ids(stage: &mut Stage, target: &PauseTarget) -> Result<Vec<ActorId>, SequenceFault> {
        match target {
            PauseTarget::Player => Ok(stage.registry.player_id().into_iter().collect()),
            PauseTarget::Enemies => Ok(stage.registry.combatant_ids()),
            PauseTarget::All => {
                let mut ids: Vec<ActorId> = stage.registry.player_id().into_iter().collect();
                ids.extend(stage.registry.combatant_ids());
                Ok(ids)
            }
            PauseTarget::Single(name) => stage
                .registry
                .resolve(name)
                .map(|id| vec![id])
                .ok_or_else(|| SequenceFault::unresolved(name)),
        }
    }

    /// Drop the snapshot of an actor that is being destroyed
    pub fn forget(&mut self, id: ActorId) {
        self.snapshots.remove(&id);
    }

    /// Drop every snapshot without restoring (stage teardown)
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GROUND_Y;
    use crate::stage::SpawnRequest;

    fn stage_with_enemy() -> (Stage, ActorId, ActorId) {
        let mut stage = Stage::default();
        let player = stage.spawn_player(Vec2::new(100.0, GROUND_Y));
        let enemy = stage
            .spawn(SpawnRequest::new(ActorKind::Enemy, "thug", Vec2::new(400.0, GROUND_Y)))
            .unwrap();
        stage.registry.get_mut(enemy).unwrap().velocity = Vec2::new(-90.0, 0.0);
        (stage, player, enemy)
    }

    #[test]
    fn test_pause_twice_keeps_first_snapshot() {
        let (mut stage, _, enemy) = stage_with_enemy();
        let mut pause = PauseCoordinator::new();

        assert!(pause.pause(&mut stage, enemy));
        stage.registry.get_mut(enemy).unwrap().velocity = Vec2::new(500.0, 0.0);
        assert!(!pause.pause(&mut stage, enemy));
        assert_eq!(pause.snapshot(enemy).unwrap().velocity, Vec2::new(-90.0, 0.0));

        assert!(pause.resume(&mut stage, enemy));
        assert_eq!(stage.registry.get(enemy).unwrap().velocity, Vec2::new(-90.0, 0.0));
        assert_eq!(pause.paused_count(), 0);
    }

    #[test]
    fn test_resume_unpaused_is_noop() {
        let (mut stage, _, enemy) = stage_with_enemy();
        let mut pause = PauseCoordinator::new();
        assert!(!pause.resume(&mut stage, enemy));
        assert_eq!(stage.registry.get(enemy).unwrap().velocity, Vec2::new(-90.0, 0.0));
    }

    #[test]
    fn test_player_pause_clears_attack_and_input() {
        let (mut stage, player, _) = stage_with_enemy();
        {
            let actor = stage.registry.get_mut(player).unwrap();
            actor.anim = AnimState::AirAttack;
            actor.attack_locked = true;
        }
        let mut pause = PauseCoordinator::new();
        pause.pause(&mut stage, player);

        let actor = stage.registry.get(player).unwrap();
        assert_eq!(actor.anim, AnimState::Idle);
        assert!(!actor.attack_locked);
        assert!(!stage.input_enabled);

        pause.resume(&mut stage, player);
        assert_eq!(stage.registry.get(player).unwrap().anim, AnimState::Idle);
        assert!(stage.input_enabled);
    }

    #[test]
    fn test_transient_enemy_pose_is_not_restored() {
        let (mut stage, _, enemy) = stage_with_enemy();
        stage.registry.get_mut(enemy).unwrap().anim = AnimState::Attack;
        let mut pause = PauseCoordinator::new();
        pause.pause(&mut stage, enemy);
        pause.resume(&mut stage, enemy);
        assert_eq!(stage.registry.get(enemy).unwrap().anim, AnimState::Idle);
    }

    #[test]
    fn test_destroyed_while_paused_drops_snapshot() {
        let (mut stage, _, enemy) = stage_with_enemy();
        let mut pause = PauseCoordinator::new();
        pause.pause(&mut stage, enemy);
        stage.destroy_actor(enemy);
        assert_eq!(pause.resume_all(&mut stage), 0);
        assert_eq!(pause.paused_count(), 0);
    }

    #[test]
    fn test_pause_target_subsets() {
        let (mut stage, player, enemy) = stage_with_enemy();
        let mut pause = PauseCoordinator::new();
        assert_eq!(pause.pause_target(&mut stage, &PauseTarget::Enemies), Ok(1));
        assert!(!pause.is_paused(player));
        assert_eq!(pause.pause_target(&mut stage, &PauseTarget::All), Ok(1));
        assert!(pause.is_paused(player) && pause.is_paused(enemy));
        assert!(matches!(
            pause.pause_target(&mut stage, &PauseTarget::Single("enemy_ghost".into())),
            Err(SequenceFault::Unresolved(_))
        ));
        assert_eq!(pause.resume_all(&mut stage), 2);
    }
}
