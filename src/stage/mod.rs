//! The stage - explicit world state the sequencer acts upon
//!
//! Holds the actor collections, camera, tween/timer scheduler, dialogue box
//! and the request queues the host drains (level loads, sound cues). The
//! sequencer never reaches for globals: everything goes through `&mut Stage`.

mod actor;
mod camera;
mod dialogue;
mod factory;
mod registry;
mod scheduler;

pub use actor::{Actor, ActorId, ActorKind, AnimState, Appearance, ProtectionLevel, SpawnMeta};
pub use camera::{StageCamera, WorldBounds};
pub use dialogue::{DialogueBox, DialogueSpec};
pub use factory::{ActorFactory, ActorTemplate, DEFAULT_BOSS_TYPE, DEFAULT_ENEMY_TYPE, SpawnRequest};
pub use registry::{ActorRoster, EntityRegistry, ProtectionRecord, TargetRef};
pub use scheduler::{Easing, Scheduler, SchedulerTick, TimerId, TweenId, TweenProperty};

use bevy::prelude::*;

use crate::constants::*;
use crate::sequence::Callback;

/// A sound cue queued for the host mixer
#[derive(Debug, Clone, PartialEq)]
pub struct SoundCue {
    pub key: String,
    pub volume: f32,
}

#[derive(Resource, Debug)]
pub struct Stage {
    pub registry: EntityRegistry,
    pub camera: StageCamera,
    pub world: WorldBounds,
    pub scheduler: Scheduler<Callback>,
    pub dialogue: DialogueBox<Callback>,
    pub factory: ActorFactory,
    /// Global player input switch (cleared while the player is paused)
    pub input_enabled: bool,
    /// Level the host should load next (set by `loadLevel`)
    pub pending_level: Option<String>,
    pub sound_cues: Vec<SoundCue>,
    pub elapsed_ms: f64,
}

impl Default for Stage {
    fn default() -> Self {
        Self::new(
            WorldBounds::new(0.0, 0.0, DEFAULT_WORLD_WIDTH, DEFAULT_WORLD_HEIGHT),
            Vec2::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
        )
    }
}

impl Stage {
    pub fn new(world: WorldBounds, viewport: Vec2) -> Self {
        let mut camera = StageCamera::new(viewport);
        camera.bounds = Some(world);
        Self {
            registry: EntityRegistry::new(),
            camera,
            world,
            scheduler: Scheduler::new(),
            dialogue: DialogueBox::default(),
            factory: ActorFactory::default(),
            input_enabled: true,
            pending_level: None,
            sound_cues: Vec::new(),
            elapsed_ms: 0.0,
        }
    }

    /// Place the player and point the camera at it
    pub fn spawn_player(&mut self, position: Vec2) -> ActorId {
        let request = SpawnRequest::new(ActorKind::Player, "player", position);
        let id = match self.factory.spawn(&mut self.registry, request) {
            Ok(id) => id,
            Err(e) => {
                // Player template always exists; keep going with a bare actor
                warn!("{}", e);
                let id = self.registry.allocate_id();
                self.registry.add(Actor::new(id, ActorKind::Player, position))
            }
        };
        self.camera.follow = Some(id);
        self.update_follow();
        id
    }

    /// Spawn through the actor factory
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<ActorId, String> {
        self.factory.spawn(&mut self.registry, request)
    }

    pub fn player_position(&self) -> Option<Vec2> {
        self.registry.player().map(|p| p.position)
    }

    pub fn player_x(&self) -> Option<f32> {
        self.player_position().map(|p| p.x)
    }

    /// Teleport the player horizontally (host movement / scripted tests)
    pub fn set_player_x(&mut self, x: f32) {
        if let Some(player) = self.registry.player_mut() {
            player.position.x = x;
        }
        self.update_follow();
    }

    /// Advance the stage clock. Returns the callbacks that became due, in
    /// scheduling order. Tween values are already applied when this returns.
    pub fn advance_time(&mut self, dt_ms: f32) -> Vec<Callback> {
        let dt_ms = dt_ms.max(0.0);
        self.elapsed_ms += dt_ms as f64;
        self.integrate(dt_ms / 1000.0);

        let tick = self.scheduler.tick(dt_ms);
        for (property, value) in tick.values {
            self.apply(property, value);
        }
        self.update_follow();

        let mut fired = tick.fired;
        if let Some(callback) = self.dialogue.tick(dt_ms) {
            fired.push(callback);
        }
        fired
    }

    /// Velocity integration for actors with auto-physics
    fn integrate(&mut self, dt: f32) {
        let ground = self.world.bottom();
        for actor in self.registry.iter_mut() {
            if !actor.is_live() || !actor.physics_enabled {
                continue;
            }
            actor.velocity.y += actor.gravity * dt;
            actor.position += actor.velocity * dt;
            if actor.gravity > 0.0 && actor.position.y > ground {
                actor.position.y = ground;
                actor.velocity.y = 0.0;
            }
        }
    }

    fn apply(&mut self, property: TweenProperty, value: f32) {
        match property {
            TweenProperty::ActorX(id) => {
                if let Some(actor) = self.registry.get_mut(id) {
                    actor.position.x = value;
                }
            }
            TweenProperty::ActorY(id) => {
                if let Some(actor) = self.registry.get_mut(id) {
                    actor.position.y = value;
                }
            }
            TweenProperty::CameraScrollX => self.camera.scroll.x = value,
            TweenProperty::CameraScrollY => self.camera.scroll.y = value,
            TweenProperty::CameraZoom => self.camera.zoom = value.max(0.01),
            TweenProperty::FadeAlpha => self.camera.fade = value.clamp(0.0, 1.0),
        }
    }

    /// Keep the followed actor centred horizontally
    pub fn update_follow(&mut self) {
        let Some(target) = self.camera.follow.and_then(|id| self.registry.get(id)) else {
            return;
        };
        if !target.is_live() {
            return;
        }
        let center = Vec2::new(target.position.x, self.camera.center().y);
        self.camera.scroll.x = self.camera.scroll_for_center(center).x;
    }

    /// Tween an actor to `to`. Only the x tween carries the completion; both
    /// run for the same duration. Returns false if the actor is gone.
    pub fn tween_actor(
        &mut self,
        id: ActorId,
        to: Vec2,
        duration_ms: f32,
        easing: Easing,
        on_complete: Option<Callback>,
    ) -> bool {
        let Some(from) = self.registry.get(id).filter(|a| a.is_live()).map(|a| a.position) else {
            return false;
        };
        self.scheduler.kill_tweens_of(id);
        self.scheduler
            .tween(TweenProperty::ActorX(id), from.x, to.x, duration_ms, easing, on_complete);
        if (to.y - from.y).abs() > f32::EPSILON {
            self.scheduler
                .tween(TweenProperty::ActorY(id), from.y, to.y, duration_ms, easing, None);
        }
        true
    }

    /// Pan so the view centres on `center`. Stops follow. Returns the target
    /// scroll after clamping.
    pub fn pan_camera(
        &mut self,
        center: Vec2,
        duration_ms: f32,
        easing: Easing,
        on_complete: Option<Callback>,
    ) -> Vec2 {
        self.camera.follow = None;
        let from = self.camera.scroll;
        let to = self.camera.scroll_for_center(center);
        self.scheduler
            .tween(TweenProperty::CameraScrollX, from.x, to.x, duration_ms, easing, on_complete);
        self.scheduler
            .tween(TweenProperty::CameraScrollY, from.y, to.y, duration_ms, easing, None);
        to
    }

    pub fn zoom_camera(&mut self, zoom: f32, duration_ms: f32, easing: Easing, on_complete: Option<Callback>) {
        let from = self.camera.zoom;
        self.scheduler
            .tween(TweenProperty::CameraZoom, from, zoom.max(0.01), duration_ms, easing, on_complete);
    }

    /// Fade the overlay towards `alpha` (1 = black)
    pub fn fade_camera(&mut self, alpha: f32, duration_ms: f32, on_complete: Option<Callback>) {
        let from = self.camera.fade;
        self.scheduler.tween(
            TweenProperty::FadeAlpha,
            from,
            alpha.clamp(0.0, 1.0),
            duration_ms,
            Easing::Linear,
            on_complete,
        );
    }

    /// Change world bounds; the camera is clamped to them
    pub fn set_world_bounds(&mut self, world: WorldBounds) {
        self.world = world;
        self.camera.bounds = Some(world);
        self.camera.clamp_scroll();
    }

    /// Stop an actor's tweens and remove it from every collection
    pub fn destroy_actor(&mut self, id: ActorId) -> Option<Actor> {
        self.scheduler.kill_tweens_of(id);
        if self.camera.follow == Some(id) {
            self.camera.follow = None;
        }
        self.registry.remove(id)
    }

    /// Apply damage; an actor at zero health goes to the dead pose
    pub fn damage(&mut self, id: ActorId, amount: f32) -> bool {
        let Some(actor) = self.registry.get_mut(id).filter(|a| a.is_live()) else {
            return false;
        };
        actor.health = (actor.health - amount).max(0.0);
        if actor.health <= 0.0 {
            actor.anim = AnimState::Dead;
            actor.ai_enabled = false;
            actor.velocity = Vec2::ZERO;
        } else {
            actor.anim = AnimState::Hurt;
        }
        true
    }

    pub fn kill(&mut self, id: ActorId) -> bool {
        self.damage(id, f32::MAX)
    }

    /// Remove defeated combatants, leaving protected ones to their sequence
    pub fn reap_defeated(&mut self) -> Vec<Actor> {
        let doomed: Vec<ActorId> = self
            .registry
            .iter()
            .filter(|a| a.kind.is_combatant() && a.health <= 0.0 && !a.protection.is_protected())
            .map(|a| a.id)
            .collect();
        doomed.into_iter().filter_map(|id| self.destroy_actor(id)).collect()
    }

    /// Drain queued sound cues (host mixer)
    pub fn take_sound_cues(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.sound_cues)
    }

    /// Level teardown: every actor, tween, timer and open dialogue goes
    pub fn reset(&mut self) {
        self.registry.clear();
        self.scheduler.clear();
        self.dialogue.close();
        self.camera.follow = None;
        self.camera.fade = 0.0;
        self.camera.zoom = 1.0;
        self.camera.scroll = Vec2::ZERO;
        self.input_enabled = true;
        self.sound_cues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_with_player(x: f32) -> (Stage, ActorId) {
        let mut stage = Stage::default();
        let id = stage.spawn_player(Vec2::new(x, GROUND_Y));
        (stage, id)
    }

    #[test]
    fn test_tween_actor_lands_on_target() {
        let (mut stage, player) = stage_with_player(100.0);
        assert!(stage.tween_actor(player, Vec2::new(600.0, GROUND_Y), 400.0, Easing::QuadOut, None));
        for _ in 0..30 {
            stage.advance_time(16.0);
        }
        assert_eq!(stage.player_x(), Some(600.0));
    }

    #[test]
    fn test_camera_follows_player_within_bounds() {
        let (mut stage, _) = stage_with_player(100.0);
        assert_eq!(stage.camera.left(), 0.0);
        stage.set_player_x(2000.0);
        assert_eq!(stage.camera.left(), 1600.0);
        stage.set_player_x(DEFAULT_WORLD_WIDTH);
        assert_eq!(stage.camera.right_edge(), DEFAULT_WORLD_WIDTH);
    }

    #[test]
    fn test_pan_stops_follow() {
        let (mut stage, _) = stage_with_player(100.0);
        let target = stage.pan_camera(Vec2::new(1400.0, 300.0), 0.0, Easing::Linear, None);
        assert!(stage.camera.follow.is_none());
        stage.advance_time(16.0);
        assert_eq!(stage.camera.scroll.x, target.x);
        assert_eq!(target.x, 1000.0);
    }

    #[test]
    fn test_destroy_kills_tweens() {
        let (mut stage, _) = stage_with_player(100.0);
        let enemy = stage
            .spawn(SpawnRequest::new(ActorKind::Enemy, "thug", Vec2::new(500.0, GROUND_Y)))
            .unwrap();
        stage.tween_actor(enemy, Vec2::new(900.0, GROUND_Y), 1000.0, Easing::Linear, None);
        assert!(stage.destroy_actor(enemy).is_some());
        assert!(!stage.scheduler.has_tweens_of(enemy));
        assert!(stage.registry.enemies().is_empty());
    }

    #[test]
    fn test_reap_skips_protected() {
        let (mut stage, _) = stage_with_player(100.0);
        let grunt = stage
            .spawn(SpawnRequest::new(ActorKind::Enemy, "thug", Vec2::new(500.0, GROUND_Y)))
            .unwrap();
        let guard = stage
            .spawn(
                SpawnRequest::new(ActorKind::Enemy, "thug", Vec2::new(600.0, GROUND_Y))
                    .with_id(Some("enemy_guard".into())),
            )
            .unwrap();
        stage
            .registry
            .protect("enemy_guard", guard, ProtectionLevel::EventControlled, serde_json::Value::Null);
        stage.kill(grunt);
        stage.kill(guard);

        let reaped = stage.reap_defeated();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, grunt);
        assert_eq!(stage.registry.enemies().len(), 1);
    }

    #[test]
    fn test_physics_integration_respects_flag() {
        let (mut stage, player) = stage_with_player(100.0);
        stage.registry.get_mut(player).unwrap().velocity = Vec2::new(100.0, 0.0);
        stage.advance_time(500.0);
        assert_eq!(stage.player_x(), Some(150.0));
        stage.registry.get_mut(player).unwrap().physics_enabled = false;
        stage.advance_time(500.0);
        assert_eq!(stage.player_x(), Some(150.0));
    }
}
