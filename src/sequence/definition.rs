//! Authoring format: sequences, triggers and the closed action set
//!
//! Sequence files are JSON arrays of
//! `{ id, trigger: { type, value, tolerance?, once? }, actions: [ { type, ... } ] }`.
//! Each action is parsed on its own, so one malformed entry becomes
//! `ActionSpec::Malformed` instead of rejecting the whole file.

use serde::Deserialize;
use std::str::FromStr;

use crate::stage::{AnimState, DialogueSpec, Easing, ProtectionLevel};

// =============================================================================
// TRIGGERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TriggerKind {
    Position,
    Percentage,
    CameraAtEnd,
    /// Anything else - never matches
    Unknown(String),
}

impl From<String> for TriggerKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "position" => TriggerKind::Position,
            "percentage" => TriggerKind::Percentage,
            "cameraAtEnd" => TriggerKind::CameraAtEnd,
            _ => TriggerKind::Unknown(kind),
        }
    }
}

fn default_once() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub value: f32,
    /// Falls back to the per-kind tolerance in the settings
    #[serde(default)]
    pub tolerance: Option<f32>,
    #[serde(default = "default_once")]
    pub once: bool,
}

impl TriggerSpec {
    pub fn new(kind: TriggerKind, value: f32) -> Self {
        Self {
            kind,
            value,
            tolerance: None,
            once: true,
        }
    }
}

// =============================================================================
// SEQUENCES
// =============================================================================

#[derive(Deserialize)]
struct RawSequence {
    id: String,
    #[serde(default)]
    trigger: Option<TriggerSpec>,
    #[serde(default)]
    actions: Vec<serde_json::Value>,
}

/// An authored sequence. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSequence")]
pub struct SequenceDefinition {
    pub id: String,
    /// None = only reachable through chaining or `trigger_by_id`
    pub trigger: Option<TriggerSpec>,
    pub actions: Vec<ActionSpec>,
}

impl From<RawSequence> for SequenceDefinition {
    fn from(raw: RawSequence) -> Self {
        Self {
            id: raw.id,
            trigger: raw.trigger,
            actions: raw.actions.into_iter().map(ActionSpec::from_value).collect(),
        }
    }
}

impl SequenceDefinition {
    pub fn new(id: &str, trigger: Option<TriggerSpec>, actions: Vec<ActionSpec>) -> Self {
        Self {
            id: id.to_string(),
            trigger,
            actions,
        }
    }

    /// Parse one sequence from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_once(&self) -> bool {
        self.trigger.as_ref().is_none_or(|t| t.once)
    }
}

// =============================================================================
// PARAMETER VALUE TYPES
// =============================================================================

/// Number-or-string field, as authored
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f32),
    Text(String),
}

/// Horizontal (or vertical) destination of a move
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "NumberOrText")]
pub enum Destination {
    Absolute(f32),
    /// `+=N` / `-=N` from the current value
    Offset(f32),
    /// `camera±N` / `cameraLeft±N`, from the view's left edge
    CameraLeft(f32),
    /// `cameraRight±N`, from the view's right edge
    CameraRight(f32),
}

impl Destination {
    pub fn resolve(self, current: f32, camera_left: f32, camera_right: f32) -> f32 {
        match self {
            Destination::Absolute(x) => x,
            Destination::Offset(dx) => current + dx,
            Destination::CameraLeft(dx) => camera_left + dx,
            Destination::CameraRight(dx) => camera_right + dx,
        }
    }
}

fn signed_suffix(rest: &str) -> Result<f32, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(0.0);
    }
    rest.parse::<f32>()
        .map_err(|_| format!("bad offset '{}'", rest))
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("+=") {
            return signed_suffix(rest).map(Destination::Offset);
        }
        if let Some(rest) = text.strip_prefix("-=") {
            return signed_suffix(rest).map(|dx| Destination::Offset(-dx));
        }
        if let Some(rest) = text.strip_prefix("cameraRight") {
            return signed_suffix(rest).map(Destination::CameraRight);
        }
        if let Some(rest) = text.strip_prefix("cameraLeft") {
            return signed_suffix(rest).map(Destination::CameraLeft);
        }
        if let Some(rest) = text.strip_prefix("camera") {
            return signed_suffix(rest).map(Destination::CameraLeft);
        }
        text.parse::<f32>()
            .map(Destination::Absolute)
            .map_err(|_| format!("unrecognised destination '{}'", text))
    }
}

impl TryFrom<NumberOrText> for Destination {
    type Error = String;

    fn try_from(raw: NumberOrText) -> Result<Self, Self::Error> {
        match raw {
            NumberOrText::Number(x) => Ok(Destination::Absolute(x)),
            NumberOrText::Text(text) => text.parse(),
        }
    }
}

/// Duration of a `wait`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "NumberOrText")]
pub enum WaitDuration {
    Fixed(f32),
    Random { min: f32, max: f32 },
    /// Bare `random` - range comes from the settings
    RandomDefault,
}

impl FromStr for WaitDuration {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text == "random" || text == "random()" {
            return Ok(WaitDuration::RandomDefault);
        }
        if let Some(args) = text.strip_prefix("random(").and_then(|s| s.strip_suffix(')')) {
            let (min, max) = args
                .split_once(',')
                .ok_or_else(|| format!("expected random(min,max), got '{}'", text))?;
            let min: f32 = min.trim().parse().map_err(|_| format!("bad min in '{}'", text))?;
            let max: f32 = max.trim().parse().map_err(|_| format!("bad max in '{}'", text))?;
            return Ok(WaitDuration::Random {
                min: min.min(max),
                max: min.max(max),
            });
        }
        text.parse::<f32>()
            .map(WaitDuration::Fixed)
            .map_err(|_| format!("unrecognised duration '{}'", text))
    }
}

impl TryFrom<NumberOrText> for WaitDuration {
    type Error = String;

    fn try_from(raw: NumberOrText) -> Result<Self, Self::Error> {
        match raw {
            NumberOrText::Number(ms) => Ok(WaitDuration::Fixed(ms)),
            NumberOrText::Text(text) => text.parse(),
        }
    }
}

/// Subset addressed by `pause` / `resume`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PauseTarget {
    Player,
    /// Every live enemy and boss
    Enemies,
    All,
    Single(String),
}

impl From<String> for PauseTarget {
    fn from(target: String) -> Self {
        match target.as_str() {
            "player" => PauseTarget::Player,
            "enemies" => PauseTarget::Enemies,
            "all" => PauseTarget::All,
            _ => PauseTarget::Single(target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    Right,
    #[default]
    Toggle,
}

impl Facing {
    /// New facing sign given the current one
    pub fn apply(self, current: f32) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
            Facing::Toggle => -current.signum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeDirection {
    /// From black to clear
    In,
    /// From clear to black
    Out,
}

// =============================================================================
// ACTION PARAMETERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TargetParams {
    pub target: Option<PauseTarget>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub target: Option<String>,
    pub x: Option<Destination>,
    pub y: Option<Destination>,
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub destroy_on_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAllParams {
    pub x: Option<Destination>,
    pub y: Option<Destination>,
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub destroy_on_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DialogueParams {
    pub speaker: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub lines: Vec<String>,
    pub portrait: Option<String>,
}

impl DialogueParams {
    /// Lines to show: `lines`, or the single `text`
    pub fn to_spec(&self) -> Option<DialogueSpec> {
        let mut lines = self.lines.clone();
        if lines.is_empty() {
            lines.extend(self.text.clone());
        }
        if lines.is_empty() {
            return None;
        }
        Some(DialogueSpec {
            speaker: self.speaker.clone(),
            lines,
            portrait: self.portrait.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WaitParams {
    pub duration: Option<WaitDuration>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CameraPanParams {
    /// View centre x
    pub x: Option<Destination>,
    pub y: Option<f32>,
    /// Pan to an actor instead of a coordinate
    pub target: Option<String>,
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Easing,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CameraZoomParams {
    pub zoom: Option<f32>,
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Easing,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BoundsParams {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FollowParams {
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FadeParams {
    pub direction: Option<FadeDirection>,
    pub duration: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SpawnParams {
    /// Factory template: enemy type, boss type or extra sprite
    #[serde(alias = "enemyType", alias = "bossType", alias = "sprite")]
    pub template: Option<String>,
    pub x: Option<Destination>,
    pub y: Option<f32>,
    /// Symbolic id for later targeting
    pub id: Option<String>,
    pub protection: Option<ProtectionLevel>,
    pub facing: Option<Facing>,
    pub health: Option<f32>,
    /// Spawn frozen until resumed
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DestroyParams {
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ZoneParams {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub timeout: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TimeoutParams {
    pub timeout: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ActorWaitParams {
    pub target: Option<String>,
    pub timeout: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LoadLevelParams {
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ClearOffscreenParams {
    /// Targets that must survive the sweep
    #[serde(default)]
    pub exclude: Vec<String>,
    pub margin: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TriggerEventParams {
    #[serde(alias = "event", alias = "sequenceId")]
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FlipParams {
    pub target: Option<String>,
    #[serde(default)]
    pub facing: Facing,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AnimationParams {
    pub target: Option<String>,
    pub animation: Option<AnimState>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProtectionParams {
    pub target: Option<String>,
    pub level: Option<ProtectionLevel>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SoundParams {
    #[serde(alias = "key")]
    pub sound: Option<String>,
    pub volume: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SpawnLoopParams {
    pub name: Option<String>,
    pub sprite: Option<String>,
    /// ms between spawns
    pub interval: Option<f32>,
    /// Extra random delay, 0..jitter ms
    pub jitter: Option<f32>,
    pub y: Option<f32>,
    /// px/sec
    pub speed: Option<f32>,
    /// Direction of travel
    pub direction: Option<Facing>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StopLoopParams {
    pub name: Option<String>,
}

// =============================================================================
// ACTIONS
// =============================================================================

/// One step of a sequence
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionSpec {
    Pause(TargetParams),
    Resume(TargetParams),
    Move(MoveParams),
    MoveAllEnemies(MoveAllParams),
    Dialogue(DialogueParams),
    Wait(WaitParams),
    CameraPan(CameraPanParams),
    CameraZoom(CameraZoomParams),
    CameraBounds(BoundsParams),
    CameraStopFollow,
    CameraFollow(FollowParams),
    Fade(FadeParams),
    SpawnEnemy(SpawnParams),
    SpawnBoss(SpawnParams),
    SpawnExtra(SpawnParams),
    DestroyEnemy(DestroyParams),
    DestroyExtra(DestroyParams),
    WaitForZone(ZoneParams),
    WaitForEnemiesCleared(TimeoutParams),
    WaitForEnemyDestroy(ActorWaitParams),
    WaitForBossDefeated(ActorWaitParams),
    LoadLevel(LoadLevelParams),
    ClearEnemiesOffscreen(ClearOffscreenParams),
    TriggerEvent(TriggerEventParams),
    Flip(FlipParams),
    SetWorldBounds(BoundsParams),
    PlayAnimation(AnimationParams),
    SetProtection(ProtectionParams),
    PlaySound(SoundParams),
    StartSpawnLoop(SpawnLoopParams),
    StopSpawnLoop(StopLoopParams),
    /// Entry that failed to parse (unknown tag, wrong field types)
    #[serde(skip)]
    Malformed { tag: String, reason: String },
}

impl ActionSpec {
    /// Parse one authored action, keeping failures as `Malformed`
    pub fn from_value(value: serde_json::Value) -> Self {
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<untagged>")
            .to_string();
        match serde_json::from_value(value) {
            Ok(action) => action,
            Err(e) => ActionSpec::Malformed {
                tag,
                reason: e.to_string(),
            },
        }
    }

    /// Authoring tag
    pub fn tag(&self) -> &str {
        match self {
            ActionSpec::Pause(_) => "pause",
            ActionSpec::Resume(_) => "resume",
            ActionSpec::Move(_) => "move",
            ActionSpec::MoveAllEnemies(_) => "moveAllEnemies",
            ActionSpec::Dialogue(_) => "dialogue",
            ActionSpec::Wait(_) => "wait",
            ActionSpec::CameraPan(_) => "cameraPan",
            ActionSpec::CameraZoom(_) => "cameraZoom",
            ActionSpec::CameraBounds(_) => "cameraBounds",
            ActionSpec::CameraStopFollow => "cameraStopFollow",
            ActionSpec::CameraFollow(_) => "cameraFollow",
            ActionSpec::Fade(_) => "fade",
            ActionSpec::SpawnEnemy(_) => "spawnEnemy",
            ActionSpec::SpawnBoss(_) => "spawnBoss",
            ActionSpec::SpawnExtra(_) => "spawnExtra",
            ActionSpec::DestroyEnemy(_) => "destroyEnemy",
            ActionSpec::DestroyExtra(_) => "destroyExtra",
            ActionSpec::WaitForZone(_) => "waitForZone",
            ActionSpec::WaitForEnemiesCleared(_) => "waitForEnemiesCleared",
            ActionSpec::WaitForEnemyDestroy(_) => "waitForEnemyDestroy",
            ActionSpec::WaitForBossDefeated(_) => "waitForBossDefeated",
            ActionSpec::LoadLevel(_) => "loadLevel",
            ActionSpec::ClearEnemiesOffscreen(_) => "clearEnemiesOffscreen",
            ActionSpec::TriggerEvent(_) => "triggerEvent",
            ActionSpec::Flip(_) => "flip",
            ActionSpec::SetWorldBounds(_) => "setWorldBounds",
            ActionSpec::PlayAnimation(_) => "playAnimation",
            ActionSpec::SetProtection(_) => "setProtection",
            ActionSpec::PlaySound(_) => "playSound",
            ActionSpec::StartSpawnLoop(_) => "startSpawnLoop",
            ActionSpec::StopSpawnLoop(_) => "stopSpawnLoop",
            ActionSpec::Malformed { tag, .. } => tag,
        }
    }

    /// Shorthand for `{ type: "pause", target }`
    pub fn pause(target: &str) -> Self {
        ActionSpec::Pause(TargetParams {
            target: Some(PauseTarget::from(target.to_string())),
        })
    }

    pub fn resume(target: &str) -> Self {
        ActionSpec::Resume(TargetParams {
            target: Some(PauseTarget::from(target.to_string())),
        })
    }

    pub fn say(speaker: &str, text: &str) -> Self {
        ActionSpec::Dialogue(DialogueParams {
            speaker: Some(speaker.to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn wait_ms(ms: f32) -> Self {
        ActionSpec::Wait(WaitParams {
            duration: Some(WaitDuration::Fixed(ms)),
        })
    }
}
