//! Sequence director - the interpreter
//!
//! At most one sequence runs at a time. The director dispatches its actions
//! in order and only moves the cursor when the current action completes.
//! Every suspension is keyed by an `ActionTicket` (run, cursor), so a late
//! tween completion racing its own safety timeout can advance at most once.
//!
//! Per-tick order, driven by `update`:
//! 1. the stage clock advances; tween values land, due callbacks are collected
//! 2. callbacks run: destroy-on-complete moves first, then the rest in
//!    scheduling order
//! 3. the next action dispatches on a later tick (after `advance_delay_ms`)
//! 4. triggers are evaluated last, and only while idle

use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};

use super::darkening::CinematicDarkening;
use super::definition::{ActionSpec, SequenceDefinition};
use super::fault::SequenceFault;
use super::pause::PauseCoordinator;
use super::trigger::{TriggerEvaluator, TriggerInput};
use crate::events::{SequenceEvent, SequenceEventBus, StartCause};
use crate::settings::SequencerSettings;
use crate::stage::{Actor, ActorId, AnimState, Stage, TimerId, WorldBounds};

/// Identifies one dispatch of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionTicket {
    pub run: u64,
    pub cursor: usize,
}

/// Deferred work scheduled on the stage clock
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    /// Dispatch the action at `cursor` (scheduled by advance)
    Dispatch(ActionTicket),
    /// A timed action (wait, camera, fade, dialogue) finished
    Complete(ActionTicket),
    /// One actor's move tween finished
    MoveDone {
        ticket: ActionTicket,
        actor: ActorId,
        destroy: bool,
        /// Auto-physics flag to restore
        physics: bool,
    },
    SafetyTimeout(ActionTicket),
    Poll(ActionTicket),
    /// Verify a destroyed actor is really gone
    ExistenceCheck { actor: ActorId, label: String },
    DarkeningMonitor { run: u64 },
    SpawnLoop { name: String, generation: u64 },
    /// A spawn-loop actor reached the far side
    LoopActorDone { actor: ActorId },
}

impl Callback {
    /// Destroys run ahead of everything else in a tick
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Callback::MoveDone { destroy: true, .. } | Callback::LoopActorDone { .. }
        )
    }
}

/// External boolean a condition-wait polls for
#[derive(Debug, Clone, PartialEq)]
pub enum WaitCondition {
    /// Player inside the rectangle
    Zone(WorldBounds),
    EnemiesCleared,
    /// Actor removed or out of health
    ActorGone(ActorId),
    /// A specific boss, or every boss
    BossDefeated(Option<ActorId>),
}

/// What the in-flight action is waiting on
#[derive(Debug, Clone, PartialEq)]
pub enum Suspension {
    Timer,
    Move { actor: ActorId, physics: bool },
    MoveAll {
        remaining: HashSet<ActorId>,
        physics: HashMap<ActorId, bool>,
    },
    /// Enemies this dialogue paused (resumed when it closes)
    Dialogue { paused: Vec<ActorId> },
    Camera,
    Condition(WaitCondition),
}

impl Suspension {
    fn polls(&self) -> bool {
        matches!(
            self,
            Suspension::Move { .. } | Suspension::MoveAll { .. } | Suspension::Condition(_)
        )
    }

    fn describe(&self) -> String {
        match self {
            Suspension::Timer => "timer".to_string(),
            Suspension::Move { actor, .. } => format!("move of {}", actor),
            Suspension::MoveAll { remaining, .. } => format!("{} enemy moves", remaining.len()),
            Suspension::Dialogue { .. } => "dialogue".to_string(),
            Suspension::Camera => "camera".to_string(),
            Suspension::Condition(condition) => format!("{:?}", condition),
        }
    }
}

/// Result of running one executor
#[derive(Debug)]
pub(super) enum Step {
    /// Finished synchronously
    Done,
    /// Parked until a callback, with a safety timeout
    Suspend { wait: Suspension, timeout_ms: f32 },
    /// Replace this sequence with another
    Chain(String),
    /// Drop the rest of the sequence
    Abandon(String),
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: ActionTicket,
    action: String,
    wait: Suspension,
    timers: Vec<TimerId>,
}

/// The running sequence
#[derive(Debug, Clone)]
pub struct RuntimeSequence {
    pub id: String,
    /// Copied from the definition at start
    pub actions: Vec<ActionSpec>,
    pub cursor: usize,
    pub run: u64,
    in_flight: Option<InFlight>,
}

impl RuntimeSequence {
    pub fn ticket(&self) -> ActionTicket {
        ActionTicket {
            run: self.run,
            cursor: self.cursor,
        }
    }

    pub fn current_action(&self) -> Option<&ActionSpec> {
        self.actions.get(self.cursor)
    }

    /// Parked on a callback or condition
    pub fn is_suspended(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        self.in_flight.as_ref().map(|f| &f.wait)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Chained(String),
    Abandoned(String),
    /// Torn down by `clear`
    Cleared,
}

/// How the last sequence ended
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: String,
    pub run: u64,
    pub cursor: usize,
    pub outcome: RunOutcome,
}

/// Background prop spawner started by `startSpawnLoop`
#[derive(Debug, Clone)]
pub struct SpawnLoop {
    pub sprite: String,
    pub interval_ms: f32,
    pub jitter_ms: f32,
    pub y: f32,
    pub speed: f32,
    /// -1 = travels left, 1 = travels right
    pub direction: f32,
    pub spawned: usize,
    pub(super) generation: u64,
    pub(super) timer: TimerId,
}

#[derive(Resource)]
pub struct SequenceDirector {
    pub(super) settings: SequencerSettings,
    sequences: Vec<SequenceDefinition>,
    triggers: TriggerEvaluator,
    active: Option<RuntimeSequence>,
    pub(super) pause: PauseCoordinator,
    pub(super) darkening: CinematicDarkening,
    monitor: Option<TimerId>,
    pub(super) spawn_loops: HashMap<String, SpawnLoop>,
    pub(super) loop_generation: u64,
    pub(super) rng: StdRng,
    runs: u64,
    pub events: SequenceEventBus,
    last_run: Option<RunSummary>,
}

impl Default for SequenceDirector {
    fn default() -> Self {
        Self::new(SequencerSettings::default())
    }
}

impl SequenceDirector {
    pub fn new(settings: SequencerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            sequences: Vec::new(),
            triggers: TriggerEvaluator::new(),
            active: None,
            pause: PauseCoordinator::new(),
            darkening: CinematicDarkening::new(),
            monitor: None,
            spawn_loops: HashMap::new(),
            loop_generation: 0,
            rng,
            runs: 0,
            events: SequenceEventBus::new(),
            last_run: None,
        }
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Swap settings (hot reload). Takes effect from the next scheduled call.
    pub fn apply_settings(&mut self, settings: SequencerSettings) {
        self.settings = settings;
    }

    // =========================================================================
    // DEFINITIONS
    // =========================================================================

    /// Install a level's sequences, forgetting which ones have fired
    pub fn register_sequences(&mut self, sequences: Vec<SequenceDefinition>) {
        self.triggers.reset();
        self.install(sequences);
        info!("Registered {} sequences", self.sequences.len());
    }

    /// Replace definitions but keep fired state (hot reload)
    pub fn reload_sequences(&mut self, sequences: Vec<SequenceDefinition>) {
        self.install(sequences);
        info!("Reloaded {} sequences", self.sequences.len());
    }

    fn install(&mut self, sequences: Vec<SequenceDefinition>) {
        let mut seen = HashSet::new();
        self.sequences = sequences
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.id.clone());
                if !fresh {
                    warn!("Duplicate sequence id '{}', keeping the first", s.id);
                }
                fresh
            })
            .collect();
    }

    pub fn sequences(&self) -> &[SequenceDefinition] {
        &self.sequences
    }

    pub fn sequence(&self, id: &str) -> Option<&SequenceDefinition> {
        self.sequences.iter().find(|s| s.id == id)
    }

    pub fn has_fired(&self, id: &str) -> bool {
        self.triggers.has_fired(id)
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&RuntimeSequence> {
        self.active.as_ref()
    }

    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }

    pub fn pause_coordinator(&self) -> &PauseCoordinator {
        &self.pause
    }

    pub fn darkening(&self) -> &CinematicDarkening {
        &self.darkening
    }

    pub fn spawn_loop(&self, name: &str) -> Option<&SpawnLoop> {
        self.spawn_loops.get(name)
    }

    fn active_run(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.run)
    }

    // =========================================================================
    // FRAME LOOP
    // =========================================================================

    /// Advance the stage by `dt_ms`, run due callbacks, then check triggers
    pub fn update(&mut self, stage: &mut Stage, dt_ms: f32) {
        let callbacks = stage.advance_time(dt_ms);
        self.events.update_time(stage.elapsed_ms);
        self.handle_callbacks(stage, callbacks);

        if self.active.is_none() && stage.pending_level.is_none() {
            self.check_triggers(stage);
        }
    }

    pub fn handle_callbacks(&mut self, stage: &mut Stage, mut callbacks: Vec<Callback>) {
        callbacks.sort_by_key(|c| !c.is_destroy());
        for callback in callbacks {
            self.handle_callback(stage, callback);
        }
    }

    pub fn handle_callback(&mut self, stage: &mut Stage, callback: Callback) {
        match callback {
            Callback::Dispatch(ticket) => {
                let ready = self
                    .active
                    .as_ref()
                    .is_some_and(|a| a.ticket() == ticket && !a.is_suspended());
                if ready {
                    self.dispatch_current(stage);
                } else {
                    debug!("Ignoring stale dispatch {:?}", ticket);
                }
            }
            Callback::Complete(ticket) => self.complete(stage, ticket),
            Callback::MoveDone {
                ticket,
                actor,
                destroy,
                physics,
            } => self.move_done(stage, ticket, actor, destroy, physics),
            Callback::SafetyTimeout(ticket) => self.time_out(stage, ticket),
            Callback::Poll(ticket) => self.poll(stage, ticket),
            Callback::ExistenceCheck { actor, label } => {
                if stage.registry.get(actor).is_some() {
                    warn!("'{}' {} survived its destroy, removing again", label, actor);
                    stage.destroy_actor(actor);
                }
            }
            Callback::DarkeningMonitor { run } => {
                if self.active_run() == Some(run) {
                    self.darkening.reassert(stage, &self.settings);
                }
            }
            Callback::SpawnLoop { name, generation } => self.spawn_loop_tick(stage, &name, generation),
            Callback::LoopActorDone { actor } => {
                if let Some(extra) = stage.registry.get_mut(actor)
                    && extra.protection.is_protected()
                {
                    debug!("Spawn loop leaves protected {} in place", actor);
                    extra.anim = AnimState::Idle;
                    return;
                }
                self.pause.forget(actor);
                self.darkening.forget(actor);
                stage.destroy_actor(actor);
            }
        }
    }

    /// Close the current dialogue line (player input)
    pub fn advance_dialogue(&mut self, stage: &mut Stage) {
        if let Some(callback) = stage.dialogue.next_line() {
            self.handle_callback(stage, callback);
        }
    }

    fn check_triggers(&mut self, stage: &mut Stage) {
        let Some(input) = TriggerInput::from_stage(stage) else {
            return;
        };
        let Some(sequence) = self
            .triggers
            .evaluate(&self.sequences, &input, &self.settings)
            .cloned()
        else {
            return;
        };
        self.start(stage, sequence, StartCause::Trigger);
    }

    /// Start a sequence by id from host code. Refused while one is running.
    pub fn trigger_by_id(&mut self, stage: &mut Stage, id: &str) -> bool {
        if let Some(active) = &self.active {
            warn!("Not starting '{}': '{}' is still running", id, active.id);
            return false;
        }
        let Some(sequence) = self.sequence(id).cloned() else {
            warn!("No sequence with id '{}'", id);
            return false;
        };
        self.start(stage, sequence, StartCause::Manual);
        true
    }

    /// Full teardown: running sequence, spawn loops, paused actors, darkening
    /// and every definition
    pub fn clear(&mut self, stage: &mut Stage) {
        self.finish(stage, RunOutcome::Cleared);
        let names: Vec<String> = self.spawn_loops.keys().cloned().collect();
        for name in names {
            self.stop_spawn_loop(stage, &name);
        }
        self.pause.resume_all(stage);
        self.pause.clear();
        self.darkening.revert(stage);
        self.sequences.clear();
        self.triggers.reset();
    }

    // =========================================================================
    // INTERPRETER
    // =========================================================================

    fn start(&mut self, stage: &mut Stage, definition: SequenceDefinition, cause: StartCause) {
        self.triggers.mark_fired(&definition);
        self.runs += 1;
        info!(
            "Sequence '{}' started ({} actions, run {})",
            definition.id,
            definition.actions.len(),
            self.runs
        );
        self.events.emit(SequenceEvent::Started {
            sequence: definition.id.clone(),
            run: self.runs,
            cause,
        });
        self.active = Some(RuntimeSequence {
            id: definition.id,
            actions: definition.actions,
            cursor: 0,
            run: self.runs,
            in_flight: None,
        });

        let paused = self.pause.pause_all_enemies(stage);
        if !paused.is_empty() {
            debug!("Paused {} enemies for the sequence", paused.len());
        }
        self.dispatch_current(stage);
    }

    fn dispatch_current(&mut self, stage: &mut Stage) {
        let Some(active) = &self.active else {
            return;
        };
        let ticket = active.ticket();
        let Some(action) = active.current_action().cloned() else {
            self.finish(stage, RunOutcome::Completed);
            return;
        };
        let sequence = active.id.clone();
        let tag = action.tag().to_string();

        self.events.emit(SequenceEvent::ActionDispatched {
            sequence: sequence.clone(),
            cursor: ticket.cursor,
            action: tag.clone(),
        });

        match self.execute(stage, &action, ticket) {
            Ok(Step::Done) => self.advance(stage),
            Ok(Step::Suspend { wait, timeout_ms }) => self.suspend(stage, ticket, tag, wait, timeout_ms),
            Ok(Step::Chain(next)) => self.chain(stage, &next),
            Ok(Step::Abandon(reason)) => self.finish(stage, RunOutcome::Abandoned(reason)),
            Err(fault) => {
                fault.log(&sequence, ticket.cursor, &tag);
                self.events.emit(SequenceEvent::ActionSkipped {
                    sequence,
                    cursor: ticket.cursor,
                    action: tag,
                    reason: fault.to_string(),
                });
                self.advance(stage);
            }
        }
    }

    /// Move the cursor on and schedule the next dispatch
    fn advance(&mut self, stage: &mut Stage) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.in_flight = None;
        active.cursor += 1;
        self.events.emit(SequenceEvent::Advanced {
            sequence: active.id.clone(),
            cursor: active.cursor,
        });
        stage
            .scheduler
            .delayed_call(self.settings.advance_delay_ms, Callback::Dispatch(active.ticket()));
    }

    fn suspend(&mut self, stage: &mut Stage, ticket: ActionTicket, action: String, wait: Suspension, timeout_ms: f32) {
        let mut timers = vec![stage.scheduler.delayed_call(timeout_ms, Callback::SafetyTimeout(ticket))];
        if wait.polls() {
            timers.push(
                stage
                    .scheduler
                    .repeating_call(self.settings.poll_interval_ms, Callback::Poll(ticket)),
            );
        }
        if let Some(active) = self.active.as_mut() {
            active.in_flight = Some(InFlight {
                ticket,
                action,
                wait,
                timers,
            });
        }
    }

    fn in_flight_mut(&mut self, ticket: ActionTicket) -> Option<&mut InFlight> {
        self.active
            .as_mut()?
            .in_flight
            .as_mut()
            .filter(|flight| flight.ticket == ticket)
    }

    fn take_in_flight(&mut self, ticket: ActionTicket) -> Option<InFlight> {
        self.in_flight_mut(ticket)?;
        self.active.as_mut()?.in_flight.take()
    }

    fn complete(&mut self, stage: &mut Stage, ticket: ActionTicket) {
        let Some(flight) = self.take_in_flight(ticket) else {
            debug!("Ignoring stale completion {:?}", ticket);
            return;
        };
        self.release(stage, flight, false);
        self.advance(stage);
    }

    fn time_out(&mut self, stage: &mut Stage, ticket: ActionTicket) {
        let Some(flight) = self.take_in_flight(ticket) else {
            return;
        };
        let sequence = self.active.as_ref().map(|a| a.id.clone()).unwrap_or_default();
        SequenceFault::Timeout(flight.wait.describe()).log(&sequence, ticket.cursor, &flight.action);
        self.events.emit(SequenceEvent::TimedOut {
            sequence,
            cursor: ticket.cursor,
            action: flight.action.clone(),
        });
        self.release(stage, flight, true);
        self.advance(stage);
    }

    /// Cancel a suspension's timers and undo what it holds
    fn release(&mut self, stage: &mut Stage, flight: InFlight, forced: bool) {
        for timer in flight.timers {
            stage.scheduler.cancel_timer(timer);
        }
        match flight.wait {
            Suspension::Dialogue { paused } => {
                if forced {
                    stage.dialogue.close();
                }
                for id in paused {
                    self.pause.resume(stage, id);
                }
            }
            Suspension::Move { actor, physics } => {
                if forced {
                    stage.scheduler.kill_tweens_of(actor);
                }
                finish_move(stage, actor, physics);
            }
            Suspension::MoveAll { physics, .. } => {
                for (actor, enabled) in physics {
                    if forced {
                        stage.scheduler.kill_tweens_of(actor);
                    }
                    finish_move(stage, actor, enabled);
                }
            }
            Suspension::Camera if forced => {
                stage.scheduler.kill_camera_tweens();
            }
            _ => {}
        }
    }

    fn move_done(&mut self, stage: &mut Stage, ticket: ActionTicket, actor: ActorId, destroy: bool, physics: bool) {
        finish_move(stage, actor, physics);
        if destroy {
            self.destroy_actor(stage, actor, "move");
        }
        let done = match self.in_flight_mut(ticket).map(|flight| &mut flight.wait) {
            Some(Suspension::Move { actor: moving, .. }) => *moving == actor,
            Some(Suspension::MoveAll { remaining, .. }) => {
                remaining.remove(&actor);
                remaining.is_empty()
            }
            _ => false,
        };
        if done {
            self.complete(stage, ticket);
        }
    }

    fn poll(&mut self, stage: &mut Stage, ticket: ActionTicket) {
        let Some(wait) = self.in_flight_mut(ticket).map(|flight| flight.wait.clone()) else {
            return;
        };
        let satisfied = match &wait {
            Suspension::Condition(condition) => condition_met(stage, condition),
            // Tweens killed under us (actor destroyed) never report back
            Suspension::Move { actor, .. } => !stage.scheduler.has_tweens_of(*actor),
            Suspension::MoveAll { remaining, .. } => remaining.iter().all(|id| !stage.scheduler.has_tweens_of(*id)),
            _ => false,
        };
        if satisfied {
            self.complete(stage, ticket);
        }
    }

    fn chain(&mut self, stage: &mut Stage, next: &str) {
        let Some(definition) = self.sequence(next).cloned() else {
            warn!("Chained sequence '{}' vanished, advancing", next);
            self.advance(stage);
            return;
        };
        let from = self.active.as_ref().map(|a| a.id.clone()).unwrap_or_default();
        info!("Sequence '{}' chains into '{}'", from, next);
        self.events.emit(SequenceEvent::Chained {
            from,
            to: next.to_string(),
        });
        self.finish(stage, RunOutcome::Chained(next.to_string()));
        self.start(stage, definition, StartCause::Chain);
    }

    /// End the running sequence. Paused actors are always resumed and the
    /// darkening always reverted, however the sequence ended.
    fn finish(&mut self, stage: &mut Stage, outcome: RunOutcome) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if let Some(flight) = active.in_flight.take() {
            self.release(stage, flight, true);
        }
        let resumed = self.pause.resume_all(stage);
        self.darkening.revert(stage);
        if let Some(timer) = self.monitor.take() {
            stage.scheduler.cancel_timer(timer);
        }

        match &outcome {
            RunOutcome::Completed => {
                info!("Sequence '{}' completed (resumed {} actors)", active.id, resumed);
                self.events.emit(SequenceEvent::Completed {
                    sequence: active.id.clone(),
                    cursor: active.cursor,
                });
            }
            RunOutcome::Chained(_) => {}
            RunOutcome::Abandoned(reason) => {
                info!("Sequence '{}' abandoned: {}", active.id, reason);
                self.events.emit(SequenceEvent::Abandoned {
                    sequence: active.id.clone(),
                    cursor: active.cursor,
                    reason: reason.clone(),
                });
            }
            RunOutcome::Cleared => {
                self.events.emit(SequenceEvent::Abandoned {
                    sequence: active.id.clone(),
                    cursor: active.cursor,
                    reason: "cleared".to_string(),
                });
            }
        }

        self.last_run = Some(RunSummary {
            id: active.id,
            run: active.run,
            cursor: active.cursor,
            outcome,
        });
    }

    // =========================================================================
    // SHARED HELPERS FOR EXECUTORS
    // =========================================================================

    /// Turn on darkening for this run and start its monitor
    pub(super) fn begin_darkening(&mut self, stage: &mut Stage, run: u64) {
        if !self.settings.darken_enabled {
            return;
        }
        self.darkening.activate(stage, &self.settings);
        if self.monitor.is_none() {
            self.monitor = Some(
                stage
                    .scheduler
                    .repeating_call(self.settings.poll_interval_ms, Callback::DarkeningMonitor { run }),
            );
        }
    }

    /// Remove an actor everywhere, then double-check it is gone
    pub(super) fn destroy_actor(&mut self, stage: &mut Stage, id: ActorId, label: &str) -> Option<Actor> {
        self.pause.forget(id);
        self.darkening.forget(id);
        let removed = stage.destroy_actor(id)?;
        self.events.emit(SequenceEvent::ActorDestroyed {
            actor: id.0,
            label: label.to_string(),
        });
        stage.scheduler.delayed_call(
            self.settings.existence_check_delay_ms,
            Callback::ExistenceCheck {
                actor: id,
                label: label.to_string(),
            },
        );
        Some(removed)
    }

    pub(super) fn running_id(&self) -> String {
        self.active.as_ref().map(|a| a.id.clone()).unwrap_or_default()
    }
}

/// Undo the move-time overrides on an actor
fn finish_move(stage: &mut Stage, actor: ActorId, physics: bool) {
    if let Some(actor) = stage.registry.get_mut(actor) {
        actor.physics_enabled = physics;
        if actor.anim == AnimState::Walk {
            actor.anim = AnimState::Idle;
        }
    }
}

pub(super) fn condition_met(stage: &Stage, condition: &WaitCondition) -> bool {
    match condition {
        WaitCondition::Zone(zone) => stage.player_position().is_some_and(|p| zone.contains(p)),
        WaitCondition::EnemiesCleared => stage.registry.remaining_enemies() == 0,
        WaitCondition::ActorGone(id) | WaitCondition::BossDefeated(Some(id)) => {
            stage.registry.get(*id).is_none_or(Actor::is_defeated)
        }
        WaitCondition::BossDefeated(None) => stage.registry.remaining_bosses() == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GROUND_Y;
    use crate::sequence::definition::*;
    use crate::stage::{ActorKind, Appearance, ProtectionLevel, SpawnRequest};

    const FRAME_MS: f32 = 16.0;

    fn director() -> SequenceDirector {
        SequenceDirector::new(SequencerSettings {
            seed: Some(7),
            ..Default::default()
        })
    }

    fn stage_with_player(x: f32) -> Stage {
        let mut stage = Stage::default();
        stage.spawn_player(Vec2::new(x, GROUND_Y));
        stage
    }

    fn spawn_enemy(stage: &mut Stage, x: f32, id: Option<&str>) -> ActorId {
        stage
            .spawn(SpawnRequest::new(ActorKind::Enemy, "thug", Vec2::new(x, GROUND_Y)).with_id(id.map(String::from)))
            .unwrap()
    }

    fn at(x: f32, id: &str, actions: Vec<ActionSpec>) -> SequenceDefinition {
        SequenceDefinition::new(id, Some(TriggerSpec::new(TriggerKind::Position, x)), actions)
    }

    fn run(director: &mut SequenceDirector, stage: &mut Stage, frames: usize) {
        for _ in 0..frames {
            director.update(stage, FRAME_MS);
        }
    }

    fn move_to(target: &str, x: &str, duration: f32) -> ActionSpec {
        ActionSpec::Move(MoveParams {
            target: Some(target.to_string()),
            x: Some(x.parse().unwrap()),
            duration: Some(duration),
            ..Default::default()
        })
    }

    fn sound(key: &str) -> ActionSpec {
        ActionSpec::PlaySound(SoundParams {
            sound: Some(key.to_string()),
            volume: None,
        })
    }

    fn advanced(director: &SequenceDirector, sequence: &str) -> Vec<usize> {
        director
            .events
            .history()
            .filter_map(|e| match &e.event {
                SequenceEvent::Advanced { sequence: s, cursor } if s == sequence => Some(*cursor),
                _ => None,
            })
            .collect()
    }

    fn count_events(director: &SequenceDirector, code: &str) -> usize {
        director
            .events
            .history()
            .filter(|e| e.event.type_code() == code)
            .count()
    }

    #[test]
    fn test_dialogue_pauses_darkens_and_restores() {
        let mut stage = stage_with_player(100.0);
        let a = spawn_enemy(&mut stage, 400.0, None);
        let b = spawn_enemy(&mut stage, 500.0, None);
        for id in [a, b] {
            stage.registry.get_mut(id).unwrap().velocity = Vec2::new(-90.0, 0.0);
        }
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "talk",
            vec![
                ActionSpec::pause("all"),
                ActionSpec::say("Boss", "You again?"),
                ActionSpec::resume("all"),
            ],
        )]);

        run(&mut director, &mut stage, 2);
        assert!(stage.dialogue.is_active());
        assert_eq!(stage.dialogue.current_line(), Some("You again?"));
        assert!(!stage.input_enabled);
        assert!(director.darkening().is_active());
        let enemy = stage.registry.get(a).unwrap();
        assert_eq!(enemy.velocity, Vec2::ZERO);
        assert_eq!(enemy.appearance.alpha, director.settings().darken_alpha);

        // Dialogue holds until the player closes it
        run(&mut director, &mut stage, 30);
        assert_eq!(director.active().unwrap().cursor, 1);

        director.advance_dialogue(&mut stage);
        run(&mut director, &mut stage, 3);

        assert!(!director.is_active());
        let summary = director.last_run().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.cursor, 3);
        for id in [a, b] {
            let enemy = stage.registry.get(id).unwrap();
            assert_eq!(enemy.velocity, Vec2::new(-90.0, 0.0));
            assert_eq!(enemy.appearance, Appearance::default());
        }
        assert_eq!(stage.registry.player().unwrap().appearance, Appearance::default());
        assert!(stage.input_enabled);
        assert_eq!(director.pause_coordinator().paused_count(), 0);
        assert!(!director.darkening().is_active());
    }

    #[test]
    fn test_darkening_starts_at_first_dialogue() {
        let mut stage = stage_with_player(100.0);
        spawn_enemy(&mut stage, 400.0, None);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "late_talk",
            vec![ActionSpec::wait_ms(100.0), ActionSpec::say("Rex", "Quiet night.")],
        )]);

        director.update(&mut stage, FRAME_MS);
        assert!(director.is_active());
        assert!(!director.darkening().is_active());

        run(&mut director, &mut stage, 10);
        assert!(stage.dialogue.is_active());
        assert!(director.darkening().is_active());
    }

    #[test]
    fn test_cleared_condition_with_no_enemies_advances_same_tick() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "empty_arena",
            vec![
                ActionSpec::WaitForEnemiesCleared(TimeoutParams::default()),
                ActionSpec::wait_ms(5_000.0),
            ],
        )]);

        director.update(&mut stage, FRAME_MS);
        assert_eq!(director.active().unwrap().cursor, 1);
    }

    #[test]
    fn test_cleared_condition_advances_within_one_poll() {
        let mut stage = stage_with_player(100.0);
        let ids: Vec<ActorId> = (0..3)
            .map(|i| spawn_enemy(&mut stage, 300.0 + i as f32 * 50.0, None))
            .collect();
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "arena",
            vec![ActionSpec::WaitForEnemiesCleared(TimeoutParams::default()), sound("cheer")],
        )]);

        run(&mut director, &mut stage, 60);
        let active = director.active().unwrap();
        assert_eq!(active.cursor, 0);
        assert!(active.is_suspended());

        for id in &ids {
            stage.kill(*id);
        }
        let poll_frames = (director.settings().poll_interval_ms / FRAME_MS).ceil() as usize + 1;
        run(&mut director, &mut stage, poll_frames);
        assert!(director.active().is_none_or(|a| a.cursor >= 1));
        assert_eq!(count_events(&director, "TO"), 0);
    }

    #[test]
    fn test_relative_move_lands_exactly() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(100.0, "walk_in", vec![move_to("player", "+=500", 2_500.0)])]);

        run(&mut director, &mut stage, 200);
        assert!(!director.is_active());
        assert_eq!(stage.player_x(), Some(600.0));
        let player = stage.registry.player().unwrap();
        assert!(player.physics_enabled);
        assert_eq!(player.anim, AnimState::Idle);
    }

    #[test]
    fn test_completion_racing_timeout_advances_once() {
        let mut stage = stage_with_player(100.0);
        let mut director = SequenceDirector::new(SequencerSettings {
            tween_safety_margin_ms: 0.0,
            seed: Some(7),
            ..Default::default()
        });
        director.register_sequences(vec![at(
            100.0,
            "race",
            vec![move_to("player", "+=100", 1_000.0), sound("done")],
        )]);

        run(&mut director, &mut stage, 200);
        assert!(!director.is_active());
        assert_eq!(advanced(&director, "race"), vec![1, 2]);
        assert_eq!(count_events(&director, "TO"), 0);
        assert_eq!(stage.sound_cues.len(), 1);
    }

    #[test]
    fn test_timeout_forces_advance_once() {
        let mut stage = stage_with_player(100.0);
        let guard = spawn_enemy(&mut stage, 400.0, Some("enemy_guard"));
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "standoff",
            vec![
                ActionSpec::WaitForEnemyDestroy(ActorWaitParams {
                    target: Some("enemy_guard".into()),
                    timeout: Some(600.0),
                }),
                sound("late"),
            ],
        )]);

        run(&mut director, &mut stage, 50);
        assert_eq!(count_events(&director, "TO"), 1);
        assert!(director.active().is_none_or(|a| a.cursor >= 1));

        stage.kill(guard);
        run(&mut director, &mut stage, 20);
        assert_eq!(advanced(&director, "standoff"), vec![1, 2]);
        assert!(stage.registry.get(guard).is_some());
    }

    #[test]
    fn test_non_finite_duration_is_skipped() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        let sequence = SequenceDefinition::from_json(
            r#"{
                "id": "forever",
                "trigger": { "type": "position", "value": 100 },
                "actions": [
                    { "type": "wait", "duration": 1e39 },
                    { "type": "fade", "direction": "out", "duration": 1e39 },
                    { "type": "playSound", "sound": "after" }
                ]
            }"#,
        )
        .unwrap();
        director.register_sequences(vec![sequence]);

        run(&mut director, &mut stage, 10);
        assert!(!director.is_active());
        assert_eq!(count_events(&director, "AK"), 2);
        assert_eq!(count_events(&director, "SC"), 1);
        assert_eq!(stage.camera.fade, 0.0);
    }

    #[test]
    fn test_long_wait_is_cut_off_at_the_ceiling() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "nap",
            vec![ActionSpec::Wait(WaitParams {
                duration: Some(WaitDuration::Fixed(300_000.0)),
            })],
        )]);

        // 59.2s
        run(&mut director, &mut stage, 3_700);
        assert!(director.is_active());
        assert_eq!(count_events(&director, "TO"), 0);

        // 60.8s
        run(&mut director, &mut stage, 100);
        assert!(!director.is_active());
        assert_eq!(count_events(&director, "TO"), 1);
    }

    #[test]
    fn test_one_sequence_at_a_time() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![
            at(100.0, "first", vec![ActionSpec::wait_ms(200.0)]),
            at(100.0, "second", vec![sound("second")]),
        ]);

        director.update(&mut stage, FRAME_MS);
        assert_eq!(director.active().unwrap().id, "first");
        assert!(!director.trigger_by_id(&mut stage, "second"));

        run(&mut director, &mut stage, 40);
        let lifecycle: Vec<String> = director
            .events
            .history()
            .filter_map(|e| match &e.event {
                SequenceEvent::Started { sequence, .. } => Some(format!("S:{}", sequence)),
                SequenceEvent::Completed { sequence, .. } => Some(format!("C:{}", sequence)),
                _ => None,
            })
            .collect();
        assert_eq!(lifecycle, vec!["S:first", "C:first", "S:second", "C:second"]);
    }

    #[test]
    fn test_malformed_and_unresolved_actions_are_skipped() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "sloppy",
            vec![
                ActionSpec::Malformed {
                    tag: "teleport".into(),
                    reason: "unknown variant `teleport`".into(),
                },
                move_to("enemy_ghost", "+=10", 100.0),
                sound("after"),
            ],
        )]);

        run(&mut director, &mut stage, 10);
        assert!(!director.is_active());
        assert_eq!(count_events(&director, "AK"), 2);
        assert_eq!(advanced(&director, "sloppy"), vec![1, 2, 3]);
        assert_eq!(stage.sound_cues[0].key, "after");
    }

    #[test]
    fn test_trigger_event_chains_without_idle_gap() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![
            at(
                100.0,
                "door",
                vec![ActionSpec::TriggerEvent(TriggerEventParams {
                    sequence: Some("hallway".into()),
                })],
            ),
            SequenceDefinition::new("hallway", None, vec![ActionSpec::wait_ms(50.0), sound("creak")]),
        ]);

        director.update(&mut stage, FRAME_MS);
        assert_eq!(director.active().unwrap().id, "hallway");
        assert!(director.events.history().any(|e| matches!(
            &e.event,
            SequenceEvent::Started { sequence, cause: StartCause::Chain, .. } if sequence == "hallway"
        )));
        assert_eq!(count_events(&director, "CH"), 1);

        run(&mut director, &mut stage, 10);
        let summary = director.last_run().unwrap();
        assert_eq!(summary.id, "hallway");
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert!(director.has_fired("door"));
    }

    #[test]
    fn test_load_level_abandons_rest() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "exit",
            vec![
                ActionSpec::LoadLevel(LoadLevelParams {
                    level: Some("docks".into()),
                }),
                sound("never"),
            ],
        )]);

        run(&mut director, &mut stage, 5);
        assert_eq!(stage.pending_level.as_deref(), Some("docks"));
        assert!(!director.is_active());
        assert!(matches!(director.last_run().unwrap().outcome, RunOutcome::Abandoned(_)));
        assert!(stage.sound_cues.is_empty());
    }

    #[test]
    fn test_spawn_then_destroy_by_symbolic_id() {
        let mut stage = stage_with_player(100.0);
        spawn_enemy(&mut stage, 400.0, None);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "critic",
            vec![
                ActionSpec::SpawnEnemy(SpawnParams {
                    template: Some("critic".into()),
                    x: Some(Destination::CameraRight(100.0)),
                    id: Some("enemy_critic".into()),
                    ..Default::default()
                }),
                ActionSpec::DestroyEnemy(DestroyParams {
                    target: Some("enemy_critic".into()),
                }),
            ],
        )]);

        director.update(&mut stage, FRAME_MS);
        assert_eq!(stage.registry.enemies().len(), 2);
        let critic = stage.registry.resolve("enemy_critic").unwrap();
        assert_eq!(stage.registry.get(critic).unwrap().position.x, stage.camera.right_edge() + 100.0);

        run(&mut director, &mut stage, 12);
        assert!(!director.is_active());
        assert_eq!(stage.registry.enemies().len(), 1);
        assert!(stage.registry.resolve("enemy_critic").is_none());
        assert_eq!(count_events(&director, "DS"), 1);
    }

    #[test]
    fn test_offscreen_sweep_spares_excluded_and_protected() {
        let mut stage = stage_with_player(100.0);
        let nearby = spawn_enemy(&mut stage, 400.0, None);
        let straggler = spawn_enemy(&mut stage, 2500.0, None);
        let lookout = spawn_enemy(&mut stage, 2600.0, Some("enemy_lookout"));
        let captain = spawn_enemy(&mut stage, 2700.0, Some("enemy_captain"));
        stage
            .registry
            .protect("enemy_captain", captain, ProtectionLevel::EventControlled, serde_json::Value::Null);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "sweep",
            vec![ActionSpec::ClearEnemiesOffscreen(ClearOffscreenParams {
                exclude: vec!["enemy_lookout".into()],
                margin: None,
            })],
        )]);

        run(&mut director, &mut stage, 5);
        assert!(!director.is_active());
        assert!(stage.registry.get(nearby).is_some());
        assert!(stage.registry.get(straggler).is_none());
        assert!(stage.registry.get(lookout).is_some());
        assert!(stage.registry.get(captain).is_some());
    }

    #[test]
    fn test_destroy_on_complete_move() {
        let mut stage = stage_with_player(100.0);
        let runner = spawn_enemy(&mut stage, 400.0, Some("enemy_runner"));
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "exit_stage_left",
            vec![ActionSpec::Move(MoveParams {
                target: Some("enemy_runner".into()),
                x: Some(Destination::Offset(200.0)),
                duration: Some(300.0),
                destroy_on_complete: true,
                ..Default::default()
            })],
        )]);

        run(&mut director, &mut stage, 40);
        assert!(!director.is_active());
        assert!(stage.registry.get(runner).is_none());
        assert_eq!(director.pause_coordinator().paused_count(), 0);
    }

    #[test]
    fn test_spawn_loop_outlives_its_sequence() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "pigeons",
            vec![ActionSpec::StartSpawnLoop(SpawnLoopParams {
                name: Some("birds".into()),
                sprite: Some("pigeon".into()),
                interval: Some(200.0),
                speed: Some(2_000.0),
                ..Default::default()
            })],
        )]);

        run(&mut director, &mut stage, 40);
        assert!(!director.is_active());
        assert!(director.spawn_loop("birds").unwrap().spawned >= 2);
        assert!(stage.registry.extras().iter().all(|a| a.anim == AnimState::Walk));

        director.clear(&mut stage);
        assert!(director.spawn_loop("birds").is_none());
        assert!(director.sequences().is_empty());
    }

    #[test]
    fn test_spawn_loop_spares_protected_extras() {
        let mut stage = stage_with_player(100.0);
        let mut director = director();
        director.register_sequences(vec![at(
            100.0,
            "pigeons",
            vec![ActionSpec::StartSpawnLoop(SpawnLoopParams {
                name: Some("birds".into()),
                sprite: Some("pigeon".into()),
                interval: Some(200.0),
                speed: Some(2_000.0),
                ..Default::default()
            })],
        )]);

        for _ in 0..60 {
            if !stage.registry.extras().is_empty() {
                break;
            }
            director.update(&mut stage, FRAME_MS);
        }
        let pigeon = stage.registry.extras().get(0).map(|a| a.id).unwrap();
        stage
            .registry
            .protect("extra_pigeon", pigeon, ProtectionLevel::EventControlled, serde_json::Value::Null);
        assert!(director.stop_spawn_loop(&mut stage, "birds"));

        run(&mut director, &mut stage, 60);
        assert!(stage.registry.get(pigeon).is_some());
        assert_eq!(stage.registry.extras().len(), 1);
        assert_eq!(stage.registry.resolve("extra_pigeon"), Some(pigeon));
    }

    #[test]
    fn test_clear_mid_dialogue_restores_everything() {
        let mut stage = stage_with_player(100.0);
        let enemy = spawn_enemy(&mut stage, 400.0, None);
        stage.registry.get_mut(enemy).unwrap().velocity = Vec2::new(-90.0, 0.0);
        let mut director = director();
        director.register_sequences(vec![at(100.0, "interrupted", vec![ActionSpec::say("Boss", "Wait...")])]);

        director.update(&mut stage, FRAME_MS);
        assert!(stage.dialogue.is_active());

        director.clear(&mut stage);
        assert!(!director.is_active());
        assert!(!stage.dialogue.is_active());
        let enemy = stage.registry.get(enemy).unwrap();
        assert_eq!(enemy.velocity, Vec2::new(-90.0, 0.0));
        assert_eq!(enemy.appearance, Appearance::default());
        assert_eq!(director.last_run().unwrap().outcome, RunOutcome::Cleared);
    }
}
