//! Stage actors - the live objects sequences act upon

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Stable handle for an actor. Never reused within a stage's lifetime, so a
/// stale handle can only miss, never alias a newer actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which collection an actor lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActorKind {
    Player,
    Enemy,
    Boss,
    /// Background/story actors (townsfolk, props, cutscene characters)
    Extra,
}

impl ActorKind {
    /// Enemies and bosses - the actors that fight the player
    pub fn is_combatant(self) -> bool {
        matches!(self, ActorKind::Enemy | ActorKind::Boss)
    }
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorKind::Player => write!(f, "player"),
            ActorKind::Enemy => write!(f, "enemy"),
            ActorKind::Boss => write!(f, "boss"),
            ActorKind::Extra => write!(f, "extra"),
        }
    }
}

/// Advisory tag that tells other systems (background spawners, offscreen
/// cleanup) to leave a sequence-owned actor alone. Nothing enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionLevel {
    #[default]
    None,
    EventControlled,
    Invulnerable,
}

impl ProtectionLevel {
    pub fn is_protected(self) -> bool {
        self != ProtectionLevel::None
    }
}

/// Animation / AI pose of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimState {
    #[default]
    Idle,
    Walk,
    Attack,
    Jump,
    AirAttack,
    Hurt,
    Dead,
}

impl AnimState {
    /// Mid-action poses that must never be restored after a pause
    pub fn is_transient(self) -> bool {
        matches!(self, AnimState::Attack | AnimState::Jump | AnimState::AirAttack)
    }
}

/// Visual state the darkening effect manipulates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub tint: Color,
    pub alpha: f32,
    pub depth: f32,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            tint: Color::WHITE,
            alpha: 1.0,
            depth: 0.0,
        }
    }
}

/// Where an actor came from
#[derive(Debug, Clone, Default)]
pub struct SpawnMeta {
    /// Factory template name (enemy type, extra sprite, ...)
    pub template: String,
    /// Sequence or spawn loop that created the actor, if any
    pub spawned_by: Option<String>,
    pub origin: Vec2,
}

/// A live stage object
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub kind: ActorKind,
    /// Author-assigned id used to target this actor from later actions
    pub symbolic_id: Option<String>,
    pub protection: ProtectionLevel,
    pub meta: SpawnMeta,

    // Kinematics
    pub position: Vec2,
    pub velocity: Vec2,
    pub gravity: f32,
    /// -1.0 = facing left, 1.0 = facing right
    pub facing: f32,
    /// Auto-physics (velocity integration). Move tweens switch it off.
    pub physics_enabled: bool,

    // Behaviour
    pub anim: AnimState,
    pub ai_enabled: bool,
    /// Attack / air-action lock (player only)
    pub attack_locked: bool,
    pub health: f32,
    pub max_health: f32,

    pub size: Vec2,
    pub color: Color,
    pub appearance: Appearance,

    pub active: bool,
    pub destroyed: bool,
}

impl Actor {
    pub fn new(id: ActorId, kind: ActorKind, position: Vec2) -> Self {
        Self {
            id,
            kind,
            symbolic_id: None,
            protection: ProtectionLevel::None,
            meta: SpawnMeta {
                origin: position,
                ..default()
            },
            position,
            velocity: Vec2::ZERO,
            gravity: 0.0,
            facing: 1.0,
            physics_enabled: true,
            anim: AnimState::Idle,
            ai_enabled: kind.is_combatant(),
            attack_locked: false,
            health: 100.0,
            max_health: 100.0,
            size: Vec2::new(48.0, 96.0),
            color: Color::WHITE,
            appearance: Appearance::default(),
            active: true,
            destroyed: false,
        }
    }

    /// Present on stage and resolvable
    pub fn is_live(&self) -> bool {
        self.active && !self.destroyed
    }

    /// Out of the fight: removed, deactivated or out of health
    pub fn is_defeated(&self) -> bool {
        !self.is_live() || self.health <= 0.0
    }

    /// Name used by `character_<name>` targets
    pub fn matches_name(&self, name: &str) -> bool {
        self.symbolic_id.as_deref() == Some(name) || self.meta.template == name
    }
}
