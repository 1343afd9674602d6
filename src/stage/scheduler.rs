//! Tween / timer scheduler
//!
//! Stands in for the engine's tween manager and time events. Nothing here
//! calls back into game code: `tick` returns the property values to apply
//! and the completion payloads that became due, in the order they were
//! scheduled, and the caller decides what they mean.

use serde::{Deserialize, Serialize};

use super::actor::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TweenId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Easing curves. Accepts the scene-graph engine's names as aliases so
/// authored files can use either spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    #[serde(alias = "Linear", alias = "None")]
    Linear,
    #[serde(alias = "Quad.easeIn", alias = "Power1.easeIn")]
    QuadIn,
    #[serde(alias = "Quad.easeOut", alias = "Power1", alias = "Power2")]
    QuadOut,
    #[serde(alias = "Quad.easeInOut", alias = "Power2.easeInOut")]
    QuadInOut,
    #[serde(alias = "Cubic.easeOut", alias = "Power3")]
    CubicOut,
    #[serde(alias = "Sine.easeInOut")]
    SineInOut,
    #[serde(alias = "Back.easeOut")]
    BackOut,
}

impl Easing {
    /// Map linear progress `t` in [0, 1] onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::SineInOut => -((std::f32::consts::PI * t).cos() - 1.0) / 2.0,
            Easing::BackOut => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// Property a tween drives
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenProperty {
    ActorX(ActorId),
    ActorY(ActorId),
    CameraScrollX,
    CameraScrollY,
    CameraZoom,
    FadeAlpha,
}

impl TweenProperty {
    pub fn actor(&self) -> Option<ActorId> {
        match self {
            TweenProperty::ActorX(id) | TweenProperty::ActorY(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(
            self,
            TweenProperty::CameraScrollX
                | TweenProperty::CameraScrollY
                | TweenProperty::CameraZoom
                | TweenProperty::FadeAlpha
        )
    }
}

#[derive(Debug, Clone)]
struct Tween<C> {
    id: u64,
    property: TweenProperty,
    from: f32,
    to: f32,
    duration_ms: f32,
    elapsed_ms: f32,
    easing: Easing,
    on_complete: Option<C>,
}

#[derive(Debug, Clone)]
struct Timer<C> {
    id: u64,
    remaining_ms: f32,
    /// Some = repeating with this period
    interval_ms: Option<f32>,
    callback: C,
}

/// Output of one scheduler tick
#[derive(Debug)]
pub struct SchedulerTick<C> {
    /// Property values to write this frame
    pub values: Vec<(TweenProperty, f32)>,
    /// Completion payloads that became due, in scheduling order
    pub fired: Vec<C>,
}

#[derive(Debug)]
pub struct Scheduler<C> {
    tweens: Vec<Tween<C>>,
    timers: Vec<Timer<C>>,
    next_id: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            tweens: Vec::new(),
            timers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<C: Clone> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Animate `property` from `from` to `to`. A zero duration completes on
    /// the next tick.
    pub fn tween(
        &mut self,
        property: TweenProperty,
        from: f32,
        to: f32,
        duration_ms: f32,
        easing: Easing,
        on_complete: Option<C>,
    ) -> TweenId {
        let id = self.allocate();
        self.tweens.push(Tween {
            id,
            property,
            from,
            to,
            duration_ms: duration_ms.max(0.0),
            elapsed_ms: 0.0,
            easing,
            on_complete,
        });
        TweenId(id)
    }

    /// Fire `callback` once after `delay_ms` (never within the current tick)
    pub fn delayed_call(&mut self, delay_ms: f32, callback: C) -> TimerId {
        let id = self.allocate();
        self.timers.push(Timer {
            id,
            remaining_ms: delay_ms.max(0.0),
            interval_ms: None,
            callback,
        });
        TimerId(id)
    }

    /// Fire `callback` every `interval_ms` until cancelled
    pub fn repeating_call(&mut self, interval_ms: f32, callback: C) -> TimerId {
        let id = self.allocate();
        let interval = interval_ms.max(1.0);
        self.timers.push(Timer {
            id,
            remaining_ms: interval,
            interval_ms: Some(interval),
            callback,
        });
        TimerId(id)
    }

    pub fn cancel_timer(&mut self, timer: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != timer.0);
        self.timers.len() != before
    }

    pub fn cancel_tween(&mut self, tween: TweenId) -> bool {
        let before = self.tweens.len();
        self.tweens.retain(|t| t.id != tween.0);
        self.tweens.len() != before
    }

    /// Stop every tween driving an actor. Their completions never fire.
    pub fn kill_tweens_of(&mut self, actor: ActorId) -> usize {
        let before = self.tweens.len();
        self.tweens.retain(|t| t.property.actor() != Some(actor));
        before - self.tweens.len()
    }

    /// Stop every camera/fade tween. Their completions never fire.
    pub fn kill_camera_tweens(&mut self) -> usize {
        let before = self.tweens.len();
        self.tweens.retain(|t| !t.property.is_camera());
        before - self.tweens.len()
    }

    pub fn has_tweens_of(&self, actor: ActorId) -> bool {
        self.tweens.iter().any(|t| t.property.actor() == Some(actor))
    }

    pub fn tween_count(&self) -> usize {
        self.tweens.len()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_timer_pending(&self, timer: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == timer.0)
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
        self.timers.clear();
    }

    /// Advance every tween and timer by `dt_ms`
    pub fn tick(&mut self, dt_ms: f32) -> SchedulerTick<C> {
        let dt_ms = dt_ms.max(0.0);
        let mut values = Vec::with_capacity(self.tweens.len());
        let mut due: Vec<(u64, C)> = Vec::new();

        self.tweens.retain_mut(|tween| {
            tween.elapsed_ms += dt_ms;
            let finished = tween.elapsed_ms >= tween.duration_ms;
            let value = if finished {
                tween.to
            } else {
                let t = tween.elapsed_ms / tween.duration_ms;
                tween.from + (tween.to - tween.from) * tween.easing.apply(t)
            };
            values.push((tween.property, value));
            if finished {
                if let Some(callback) = tween.on_complete.take() {
                    due.push((tween.id, callback));
                }
                return false;
            }
            true
        });

        self.timers.retain_mut(|timer| {
            timer.remaining_ms -= dt_ms;
            if timer.remaining_ms > 0.0 {
                return true;
            }
            due.push((timer.id, timer.callback.clone()));
            match timer.interval_ms {
                Some(interval) => {
                    timer.remaining_ms += interval;
                    if timer.remaining_ms <= 0.0 {
                        timer.remaining_ms = interval;
                    }
                    true
                }
                None => false,
            }
        });

        due.sort_by_key(|(id, _)| *id);
        SchedulerTick {
            values,
            fired: due.into_iter().map(|(_, callback)| callback).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicOut,
            Easing::SineInOut,
            Easing::BackOut,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-5, "{:?} at 0", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-5, "{:?} at 1", easing);
        }
    }

    #[test]
    fn test_easing_aliases() {
        let easing: Easing = serde_json::from_str("\"Sine.easeInOut\"").unwrap();
        assert_eq!(easing, Easing::SineInOut);
        let easing: Easing = serde_json::from_str("\"quadOut\"").unwrap();
        assert_eq!(easing, Easing::QuadOut);
    }

    #[test]
    fn test_tween_lands_exactly_on_target() {
        let mut scheduler: Scheduler<&str> = Scheduler::new();
        scheduler.tween(TweenProperty::ActorX(ActorId(1)), 100.0, 600.0, 1000.0, Easing::QuadOut, Some("done"));

        let tick = scheduler.tick(500.0);
        assert!(tick.fired.is_empty());
        let (_, midway) = tick.values[0];
        assert!(midway > 100.0 && midway < 600.0);

        let tick = scheduler.tick(600.0);
        assert_eq!(tick.values[0].1, 600.0);
        assert_eq!(tick.fired, vec!["done"]);
        assert_eq!(scheduler.tween_count(), 0);
    }

    #[test]
    fn test_zero_delay_fires_next_tick() {
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.delayed_call(0.0, 7);
        assert_eq!(scheduler.tick(0.0).fired, vec![7]);
        assert!(scheduler.tick(16.0).fired.is_empty());
    }

    #[test]
    fn test_fired_in_scheduling_order() {
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.delayed_call(50.0, 1);
        scheduler.tween(TweenProperty::CameraZoom, 1.0, 2.0, 10.0, Easing::Linear, Some(2));
        scheduler.delayed_call(20.0, 3);
        assert_eq!(scheduler.tick(100.0).fired, vec![1, 2, 3]);
    }

    #[test]
    fn test_repeating_timer_until_cancelled() {
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        let timer = scheduler.repeating_call(100.0, 9);
        assert!(scheduler.tick(50.0).fired.is_empty());
        assert_eq!(scheduler.tick(50.0).fired, vec![9]);
        assert_eq!(scheduler.tick(100.0).fired, vec![9]);
        assert!(scheduler.cancel_timer(timer));
        assert!(scheduler.tick(500.0).fired.is_empty());
    }

    #[test]
    fn test_killed_tween_never_completes() {
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.tween(TweenProperty::ActorX(ActorId(4)), 0.0, 10.0, 100.0, Easing::Linear, Some(1));
        assert!(scheduler.has_tweens_of(ActorId(4)));
        assert_eq!(scheduler.kill_tweens_of(ActorId(4)), 1);
        assert!(scheduler.tick(1000.0).fired.is_empty());
    }
}
