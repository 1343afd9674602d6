//! Action executors
//!
//! One arm per authored action type. Executors report a `Step` or a fault and
//! never touch the cursor; sequencing belongs to the director.

use bevy::prelude::*;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use super::definition::*;
use super::director::{
    ActionTicket, Callback, SequenceDirector, SpawnLoop, Step, Suspension, WaitCondition, condition_met,
};
use super::fault::SequenceFault;
use crate::constants::*;
use crate::events::SequenceEvent;
use crate::stage::{
    ActorId, ActorKind, AnimState, DEFAULT_BOSS_TYPE, DEFAULT_ENEMY_TYPE, Easing, SoundCue, SpawnRequest, Stage,
    WorldBounds,
};

fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, SequenceFault> {
    value.as_ref().ok_or_else(|| SequenceFault::missing(field))
}

/// Authored duration, or the fallback when none is given. Negative values
/// count as zero; non-finite ones are an authoring error.
fn duration_or(duration: Option<f32>, fallback: f32) -> Result<f32, SequenceFault> {
    let ms = duration.unwrap_or(fallback);
    if !ms.is_finite() {
        return Err(SequenceFault::Authoring(format!("duration must be finite, got {}", ms)));
    }
    Ok(ms.max(0.0))
}

fn resolve(stage: &mut Stage, target: &str) -> Result<ActorId, SequenceFault> {
    stage
        .registry
        .resolve(target)
        .ok_or_else(|| SequenceFault::unresolved(target))
}

/// Bounds rectangle from authored params, defaulting to the current world
fn bounds_from(params: &BoundsParams, world: WorldBounds) -> Result<WorldBounds, SequenceFault> {
    let width = *required(&params.width, "width")?;
    let height = params.height.unwrap_or(world.height);
    if width <= 0.0 || height <= 0.0 {
        return Err(SequenceFault::Authoring(format!(
            "bounds must have positive size, got {}x{}",
            width, height
        )));
    }
    Ok(WorldBounds::new(
        params.x.unwrap_or(world.x),
        params.y.unwrap_or(world.y),
        width,
        height,
    ))
}

/// Hand an actor to a move tween. Returns its previous auto-physics flag,
/// or None if the actor is gone.
#[allow(clippy::too_many_arguments)]
fn begin_move(
    stage: &mut Stage,
    id: ActorId,
    x: Option<Destination>,
    y: Option<Destination>,
    duration_ms: f32,
    easing: Easing,
    ticket: ActionTicket,
    destroy: bool,
) -> Option<bool> {
    let (left, right) = (stage.camera.left(), stage.camera.right_edge());
    let top = stage.camera.scroll.y;
    let bottom = top + stage.camera.view_size().y;

    let actor = stage.registry.get_mut(id).filter(|a| a.is_live())?;
    let from = actor.position;
    let to = Vec2::new(
        x.map_or(from.x, |d| d.resolve(from.x, left, right)),
        y.map_or(from.y, |d| d.resolve(from.y, top, bottom)),
    );
    let physics = actor.physics_enabled;
    actor.physics_enabled = false;
    if to.x != from.x {
        actor.facing = (to.x - from.x).signum();
        actor.anim = AnimState::Walk;
    }

    stage.tween_actor(
        id,
        to,
        duration_ms,
        easing,
        Some(Callback::MoveDone {
            ticket,
            actor: id,
            destroy,
            physics,
        }),
    );
    Some(physics)
}

impl SequenceDirector {
    pub(super) fn execute(
        &mut self,
        stage: &mut Stage,
        action: &ActionSpec,
        ticket: ActionTicket,
    ) -> Result<Step, SequenceFault> {
        match action {
            ActionSpec::Pause(params) => {
                let target = required(&params.target, "target")?;
                let count = self.pause.pause_target(stage, target)?;
                debug!("Paused {} actors ({:?})", count, target);
                Ok(Step::Done)
            }
            ActionSpec::Resume(params) => {
                let target = required(&params.target, "target")?;
                let count = self.pause.resume_target(stage, target)?;
                debug!("Resumed {} actors ({:?})", count, target);
                Ok(Step::Done)
            }
            ActionSpec::Move(params) => self.move_actor(stage, params, ticket),
            ActionSpec::MoveAllEnemies(params) => self.move_all_enemies(stage, params, ticket),
            ActionSpec::Dialogue(params) => self.show_dialogue(stage, params, ticket),
            ActionSpec::Wait(params) => {
                let ms = self.wait_duration(params.duration)?;
                stage.scheduler.delayed_call(ms, Callback::Complete(ticket));
                Ok(Step::Suspend {
                    wait: Suspension::Timer,
                    timeout_ms: self.settings.tween_timeout(ms),
                })
            }
            ActionSpec::CameraPan(params) => self.pan_camera(stage, params, ticket),
            ActionSpec::CameraZoom(params) => {
                let zoom = *required(&params.zoom, "zoom")?;
                if zoom <= 0.0 {
                    return Err(SequenceFault::Authoring(format!("zoom must be positive, got {}", zoom)));
                }
                let duration = duration_or(params.duration, DEFAULT_CAMERA_MS)?;
                stage.zoom_camera(zoom, duration, params.easing, Some(Callback::Complete(ticket)));
                Ok(self.camera_wait(duration))
            }
            ActionSpec::CameraBounds(params) => {
                stage.camera.bounds = Some(bounds_from(params, stage.world)?);
                stage.camera.clamp_scroll();
                Ok(Step::Done)
            }
            ActionSpec::CameraStopFollow => {
                stage.camera.follow = None;
                Ok(Step::Done)
            }
            ActionSpec::CameraFollow(params) => {
                let target = params.target.as_deref().unwrap_or("player");
                let id = resolve(stage, target)?;
                stage.camera.follow = Some(id);
                stage.update_follow();
                Ok(Step::Done)
            }
            ActionSpec::Fade(params) => {
                let direction = *required(&params.direction, "direction")?;
                let duration = duration_or(params.duration, DEFAULT_FADE_MS)?;
                let alpha = match direction {
                    FadeDirection::In => {
                        stage.camera.fade = 1.0;
                        0.0
                    }
                    FadeDirection::Out => 1.0,
                };
                stage.fade_camera(alpha, duration, Some(Callback::Complete(ticket)));
                Ok(self.camera_wait(duration))
            }
            ActionSpec::SpawnEnemy(params) => self.spawn_actor(stage, ActorKind::Enemy, params, DEFAULT_ENEMY_TYPE),
            ActionSpec::SpawnBoss(params) => self.spawn_actor(stage, ActorKind::Boss, params, DEFAULT_BOSS_TYPE),
            ActionSpec::SpawnExtra(params) => self.spawn_actor(stage, ActorKind::Extra, params, "extra"),
            ActionSpec::DestroyEnemy(params) => {
                self.destroy_target(stage, params, &[ActorKind::Enemy, ActorKind::Boss])
            }
            ActionSpec::DestroyExtra(params) => self.destroy_target(stage, params, &[ActorKind::Extra]),
            ActionSpec::WaitForZone(params) => {
                let x = *required(&params.x, "x")?;
                let width = *required(&params.width, "width")?;
                let zone = WorldBounds::new(
                    x,
                    params.y.unwrap_or(stage.world.y),
                    width,
                    params.height.unwrap_or(stage.world.height),
                );
                Ok(self.wait_for(stage, WaitCondition::Zone(zone), params.timeout))
            }
            ActionSpec::WaitForEnemiesCleared(params) => {
                Ok(self.wait_for(stage, WaitCondition::EnemiesCleared, params.timeout))
            }
            ActionSpec::WaitForEnemyDestroy(params) => {
                let target = required(&params.target, "target")?;
                match stage.registry.resolve(target) {
                    Some(id) => Ok(self.wait_for(stage, WaitCondition::ActorGone(id), params.timeout)),
                    None => {
                        info!("'{}' is already gone", target);
                        Ok(Step::Done)
                    }
                }
            }
            ActionSpec::WaitForBossDefeated(params) => {
                let condition = match params.target.as_deref() {
                    None => WaitCondition::BossDefeated(None),
                    Some(target) => match stage.registry.resolve(target) {
                        Some(id) => WaitCondition::BossDefeated(Some(id)),
                        None => {
                            info!("Boss '{}' is already gone", target);
                            return Ok(Step::Done);
                        }
                    },
                };
                Ok(self.wait_for(stage, condition, params.timeout))
            }
            ActionSpec::LoadLevel(params) => {
                let level = required(&params.level, "level")?.clone();
                info!("Requesting level '{}'", level);
                stage.pending_level = Some(level.clone());
                self.events.emit(SequenceEvent::LevelRequested { level: level.clone() });
                Ok(Step::Abandon(format!("loading level '{}'", level)))
            }
            ActionSpec::ClearEnemiesOffscreen(params) => {
                let margin = params.margin.unwrap_or(self.settings.offscreen_margin);
                let keep: HashSet<ActorId> = params
                    .exclude
                    .iter()
                    .filter_map(|target| stage.registry.resolve(target))
                    .collect();
                let doomed: Vec<ActorId> = stage
                    .registry
                    .enemies()
                    .iter()
                    .filter(|a| a.is_live() && !a.protection.is_protected() && !keep.contains(&a.id))
                    .filter(|a| !stage.camera.is_visible_x(a.position.x, margin))
                    .map(|a| a.id)
                    .collect();
                for id in &doomed {
                    self.destroy_actor(stage, *id, "offscreen");
                }
                info!("Cleared {} offscreen enemies", doomed.len());
                Ok(Step::Done)
            }
            ActionSpec::TriggerEvent(params) => {
                let next = required(&params.sequence, "sequence")?;
                if self.sequence(next).is_none() {
                    return Err(SequenceFault::Authoring(format!("unknown sequence '{}'", next)));
                }
                Ok(Step::Chain(next.clone()))
            }
            ActionSpec::Flip(params) => {
                let target = required(&params.target, "target")?;
                let id = resolve(stage, target)?;
                if let Some(actor) = stage.registry.get_mut(id) {
                    actor.facing = params.facing.apply(actor.facing);
                }
                Ok(Step::Done)
            }
            ActionSpec::SetWorldBounds(params) => {
                let bounds = bounds_from(params, stage.world)?;
                stage.set_world_bounds(bounds);
                Ok(Step::Done)
            }
            ActionSpec::PlayAnimation(params) => {
                let target = required(&params.target, "target")?;
                let animation = *required(&params.animation, "animation")?;
                let id = resolve(stage, target)?;
                if let Some(actor) = stage.registry.get_mut(id) {
                    actor.anim = animation;
                }
                Ok(Step::Done)
            }
            ActionSpec::SetProtection(params) => {
                let target = required(&params.target, "target")?;
                let level = *required(&params.level, "level")?;
                let id = resolve(stage, target)?;
                stage
                    .registry
                    .protect(target, id, level, params.metadata.clone());
                Ok(Step::Done)
            }
            ActionSpec::PlaySound(params) => {
                let key = required(&params.sound, "sound")?.clone();
                stage.sound_cues.push(SoundCue {
                    key,
                    volume: params.volume.unwrap_or(1.0).clamp(0.0, 1.0),
                });
                Ok(Step::Done)
            }
            ActionSpec::StartSpawnLoop(params) => self.start_spawn_loop(stage, params),
            ActionSpec::StopSpawnLoop(params) => {
                let name = required(&params.name, "name")?;
                if !self.stop_spawn_loop(stage, name) {
                    return Err(SequenceFault::Authoring(format!("no spawn loop named '{}'", name)));
                }
                Ok(Step::Done)
            }
            ActionSpec::Malformed { reason, .. } => Err(SequenceFault::Authoring(reason.clone())),
        }
    }

    fn camera_wait(&self, duration_ms: f32) -> Step {
        Step::Suspend {
            wait: Suspension::Camera,
            timeout_ms: self.settings.tween_timeout(duration_ms),
        }
    }

    /// Suspend on a condition, or finish now if it already holds
    fn wait_for(&self, stage: &Stage, condition: WaitCondition, timeout: Option<f32>) -> Step {
        if condition_met(stage, &condition) {
            return Step::Done;
        }
        Step::Suspend {
            wait: Suspension::Condition(condition),
            timeout_ms: self.settings.condition_timeout(timeout),
        }
    }

    fn wait_duration(&mut self, duration: Option<WaitDuration>) -> Result<f32, SequenceFault> {
        let ms = match duration {
            None => self.settings.default_wait_ms,
            Some(WaitDuration::Fixed(ms)) => ms,
            Some(WaitDuration::Random { min, max }) => self.random_between(min, max)?,
            Some(WaitDuration::RandomDefault) => {
                self.random_between(self.settings.random_wait_min_ms, self.settings.random_wait_max_ms)?
            }
        };
        duration_or(Some(ms), 0.0)
    }

    fn random_between(&mut self, min: f32, max: f32) -> Result<f32, SequenceFault> {
        if !min.is_finite() || !max.is_finite() {
            return Err(SequenceFault::Authoring(format!(
                "random wait bounds must be finite, got ({}, {})",
                min, max
            )));
        }
        if max <= min {
            return Ok(min);
        }
        Ok(self.rng.gen_range(min..=max))
    }

    // =========================================================================
    // MOVEMENT
    // =========================================================================

    fn move_actor(&mut self, stage: &mut Stage, params: &MoveParams, ticket: ActionTicket) -> Result<Step, SequenceFault> {
        let target = required(&params.target, "target")?;
        if params.x.is_none() && params.y.is_none() {
            return Err(SequenceFault::missing("x"));
        }
        let id = resolve(stage, target)?;
        let duration = duration_or(params.duration, self.settings.default_move_duration_ms)?;
        let physics = begin_move(
            stage,
            id,
            params.x,
            params.y,
            duration,
            params.easing,
            ticket,
            params.destroy_on_complete,
        )
        .ok_or_else(|| SequenceFault::unresolved(target))?;

        Ok(Step::Suspend {
            wait: Suspension::Move { actor: id, physics },
            timeout_ms: self.settings.tween_timeout(duration),
        })
    }

    fn move_all_enemies(
        &mut self,
        stage: &mut Stage,
        params: &MoveAllParams,
        ticket: ActionTicket,
    ) -> Result<Step, SequenceFault> {
        if params.x.is_none() && params.y.is_none() {
            return Err(SequenceFault::missing("x"));
        }
        let duration = duration_or(params.duration, self.settings.default_move_duration_ms)?;

        let mut remaining = HashSet::new();
        let mut physics = HashMap::new();
        for id in stage.registry.live_ids(ActorKind::Enemy) {
            if let Some(enabled) = begin_move(
                stage,
                id,
                params.x,
                params.y,
                duration,
                params.easing,
                ticket,
                params.destroy_on_complete,
            ) {
                remaining.insert(id);
                physics.insert(id, enabled);
            }
        }
        if remaining.is_empty() {
            debug!("moveAllEnemies: no enemies on stage");
            return Ok(Step::Done);
        }

        Ok(Step::Suspend {
            wait: Suspension::MoveAll { remaining, physics },
            timeout_ms: self.settings.tween_timeout(duration),
        })
    }

    // =========================================================================
    // DIALOGUE & CAMERA
    // =========================================================================

    fn show_dialogue(
        &mut self,
        stage: &mut Stage,
        params: &DialogueParams,
        ticket: ActionTicket,
    ) -> Result<Step, SequenceFault> {
        let spec = params.to_spec().ok_or_else(|| SequenceFault::missing("text"))?;

        self.begin_darkening(stage, ticket.run);
        let paused = self.pause.pause_all_enemies(stage);
        stage.dialogue.auto_advance_ms = self.settings.dialogue_auto_advance_ms;
        if let Some(replaced) = stage.dialogue.show(spec, Callback::Complete(ticket)) {
            debug!("Dropped completion of replaced dialogue: {:?}", replaced);
        }

        Ok(Step::Suspend {
            wait: Suspension::Dialogue { paused },
            timeout_ms: self.settings.dialogue_timeout(),
        })
    }

    fn pan_camera(
        &mut self,
        stage: &mut Stage,
        params: &CameraPanParams,
        ticket: ActionTicket,
    ) -> Result<Step, SequenceFault> {
        let current = stage.camera.center();
        let center = match &params.target {
            Some(target) => {
                let id = resolve(stage, target)?;
                let position = stage
                    .registry
                    .get(id)
                    .map(|a| a.position)
                    .ok_or_else(|| SequenceFault::unresolved(target))?;
                Vec2::new(position.x, params.y.unwrap_or(current.y))
            }
            None => {
                let x = required(&params.x, "x")?.resolve(current.x, stage.camera.left(), stage.camera.right_edge());
                Vec2::new(x, params.y.unwrap_or(current.y))
            }
        };
        let duration = duration_or(params.duration, DEFAULT_CAMERA_MS)?;
        stage.pan_camera(center, duration, params.easing, Some(Callback::Complete(ticket)));
        Ok(self.camera_wait(duration))
    }

    // =========================================================================
    // SPAWN / DESTROY
    // =========================================================================

    fn spawn_actor(
        &mut self,
        stage: &mut Stage,
        kind: ActorKind,
        params: &SpawnParams,
        default_template: &str,
    ) -> Result<Step, SequenceFault> {
        let template = params.template.as_deref().unwrap_or(default_template);
        let anchor = stage.player_x().unwrap_or(stage.camera.center().x);
        let x = params
            .x
            .unwrap_or(Destination::CameraRight(self.settings.offscreen_margin))
            .resolve(anchor, stage.camera.left(), stage.camera.right_edge());

        let mut request =
            SpawnRequest::new(kind, template, Vec2::new(x, params.y.unwrap_or(GROUND_Y))).with_id(params.id.clone());
        request.facing = params.facing.map(|f| f.apply(1.0));
        request.health = params.health;
        request.spawned_by = Some(self.running_id());
        let id = stage.spawn(request).map_err(SequenceFault::FatalSetup)?;

        if let Some(level) = params.protection.filter(|l| l.is_protected()) {
            let key = params
                .id
                .clone()
                .unwrap_or_else(|| format!("{}_{}", kind, id.0));
            stage.registry.protect(&key, id, level, serde_json::Value::Null);
        }
        self.events.emit(SequenceEvent::ActorSpawned {
            actor: id.0,
            kind,
            label: params.id.clone().unwrap_or_else(|| template.to_string()),
        });

        if params.paused {
            self.pause.pause(stage, id);
        }
        self.darkening.reassert(stage, &self.settings);
        Ok(Step::Done)
    }

    fn destroy_target(
        &mut self,
        stage: &mut Stage,
        params: &DestroyParams,
        kinds: &[ActorKind],
    ) -> Result<Step, SequenceFault> {
        let target = required(&params.target, "target")?;
        let id = resolve(stage, target)?;
        let kind = stage.registry.get(id).map(|a| a.kind);
        if !kind.is_some_and(|k| kinds.contains(&k)) {
            return Err(SequenceFault::Authoring(format!(
                "'{}' resolves to a {:?}, which this action cannot destroy",
                target, kind
            )));
        }
        self.destroy_actor(stage, id, target);
        Ok(Step::Done)
    }

    // =========================================================================
    // SPAWN LOOPS
    // =========================================================================

    fn start_spawn_loop(&mut self, stage: &mut Stage, params: &SpawnLoopParams) -> Result<Step, SequenceFault> {
        let name = required(&params.name, "name")?.clone();
        let sprite = required(&params.sprite, "sprite")?.clone();
        let interval_ms = duration_or(Some(*required(&params.interval, "interval")?), 0.0)?;
        let jitter_ms = duration_or(params.jitter, 0.0)?;
        if interval_ms <= 0.0 {
            return Err(SequenceFault::Authoring(format!(
                "spawn loop interval must be positive, got {}",
                interval_ms
            )));
        }
        if self.stop_spawn_loop(stage, &name) {
            debug!("Restarting spawn loop '{}'", name);
        }

        self.loop_generation += 1;
        let generation = self.loop_generation;
        let timer = stage.scheduler.delayed_call(
            interval_ms,
            Callback::SpawnLoop {
                name: name.clone(),
                generation,
            },
        );
        info!("Spawn loop '{}' started ({} every {}ms)", name, sprite, interval_ms);
        self.spawn_loops.insert(
            name,
            SpawnLoop {
                sprite,
                interval_ms,
                jitter_ms,
                y: params.y.unwrap_or(GROUND_Y),
                speed: params.speed.unwrap_or(SPAWN_LOOP_SPEED).max(1.0),
                direction: params.direction.unwrap_or(Facing::Left).apply(1.0),
                spawned: 0,
                generation,
                timer,
            },
        );
        Ok(Step::Done)
    }

    /// Stop a spawn loop. Actors already walking finish their crossing.
    pub fn stop_spawn_loop(&mut self, stage: &mut Stage, name: &str) -> bool {
        let Some(spawn_loop) = self.spawn_loops.remove(name) else {
            return false;
        };
        stage.scheduler.cancel_timer(spawn_loop.timer);
        info!("Spawn loop '{}' stopped after {} spawns", name, spawn_loop.spawned);
        true
    }

    pub(super) fn spawn_loop_tick(&mut self, stage: &mut Stage, name: &str, generation: u64) {
        let Some(spawn_loop) = self
            .spawn_loops
            .get(name)
            .filter(|l| l.generation == generation)
            .cloned()
        else {
            return;
        };

        let margin = self.settings.offscreen_margin;
        let (left, right) = (stage.camera.left() - margin, stage.camera.right_edge() + margin);
        let (start_x, end_x) = if spawn_loop.direction < 0.0 {
            (right, left)
        } else {
            (left, right)
        };

        let mut request = SpawnRequest::new(ActorKind::Extra, &spawn_loop.sprite, Vec2::new(start_x, spawn_loop.y));
        request.facing = Some(spawn_loop.direction);
        request.spawned_by = Some(format!("loop:{}", name));
        match stage.spawn(request) {
            Ok(id) => {
                if let Some(actor) = stage.registry.get_mut(id) {
                    actor.physics_enabled = false;
                    actor.anim = AnimState::Walk;
                }
                let duration = (end_x - start_x).abs() / spawn_loop.speed * 1000.0;
                stage.tween_actor(
                    id,
                    Vec2::new(end_x, spawn_loop.y),
                    duration,
                    Easing::Linear,
                    Some(Callback::LoopActorDone { actor: id }),
                );
                self.darkening.reassert(stage, &self.settings);
            }
            Err(e) => warn!("Spawn loop '{}': {}", name, e),
        }

        let jitter = if spawn_loop.jitter_ms > 0.0 {
            self.rng.gen_range(0.0..=spawn_loop.jitter_ms)
        } else {
            0.0
        };
        let timer = stage.scheduler.delayed_call(
            spawn_loop.interval_ms + jitter,
            Callback::SpawnLoop {
                name: name.to_string(),
                generation,
            },
        );
        if let Some(entry) = self.spawn_loops.get_mut(name) {
            entry.timer = timer;
            entry.spawned += 1;
        }
    }
}
