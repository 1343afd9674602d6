//! Actor factory - builds stage actors from named templates

use bevy::prelude::*;
use std::collections::HashMap;

use super::actor::{Actor, ActorId, ActorKind};
use super::registry::EntityRegistry;
use crate::constants::*;

/// Enemy type used when a spawn action names none
pub const DEFAULT_ENEMY_TYPE: &str = "thug";
/// Boss type used when a spawn action names none
pub const DEFAULT_BOSS_TYPE: &str = "warlord";

/// Stats and look for one spawnable type
#[derive(Debug, Clone)]
pub struct ActorTemplate {
    pub health: f32,
    pub size: Vec2,
    pub color: Color,
    pub gravity: f32,
}

impl ActorTemplate {
    pub fn new(health: f32, size: Vec2, color: Color) -> Self {
        Self {
            health,
            size,
            color,
            gravity: 0.0,
        }
    }
}

/// One spawn call
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub kind: ActorKind,
    pub template: String,
    pub position: Vec2,
    pub symbolic_id: Option<String>,
    pub facing: Option<f32>,
    pub health: Option<f32>,
    pub spawned_by: Option<String>,
}

impl SpawnRequest {
    pub fn new(kind: ActorKind, template: &str, position: Vec2) -> Self {
        Self {
            kind,
            template: template.to_string(),
            position,
            symbolic_id: None,
            facing: None,
            health: None,
            spawned_by: None,
        }
    }

    pub fn with_id(mut self, symbolic_id: Option<String>) -> Self {
        self.symbolic_id = symbolic_id;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ActorFactory {
    templates: HashMap<(ActorKind, String), ActorTemplate>,
    /// Extras accept any template name and fall back to this
    pub extra_template: ActorTemplate,
    pub player_template: ActorTemplate,
}

impl Default for ActorFactory {
    fn default() -> Self {
        let mut factory = Self {
            templates: HashMap::new(),
            extra_template: ActorTemplate::new(1.0, EXTRA_SIZE, EXTRA_COLOR),
            player_template: ActorTemplate::new(100.0, PLAYER_SIZE, PLAYER_COLOR),
        };
        factory.register(ActorKind::Enemy, "thug", ActorTemplate::new(30.0, ENEMY_SIZE, ENEMY_COLOR));
        factory.register(
            ActorKind::Enemy,
            "brawler",
            ActorTemplate::new(60.0, ENEMY_SIZE * Vec2::new(1.2, 1.05), Color::srgb(0.8, 0.45, 0.2)),
        );
        factory.register(
            ActorKind::Enemy,
            "critic",
            ActorTemplate::new(40.0, ENEMY_SIZE, Color::srgb(0.55, 0.55, 0.8)),
        );
        factory.register(
            ActorKind::Enemy,
            "knife",
            ActorTemplate::new(25.0, ENEMY_SIZE * Vec2::new(0.9, 0.95), Color::srgb(0.9, 0.2, 0.45)),
        );
        factory.register(ActorKind::Boss, "warlord", ActorTemplate::new(300.0, BOSS_SIZE, BOSS_COLOR));
        factory.register(
            ActorKind::Boss,
            "producer",
            ActorTemplate::new(220.0, BOSS_SIZE * Vec2::new(0.9, 0.9), Color::srgb(0.3, 0.2, 0.55)),
        );
        factory
    }
}

impl ActorFactory {
    pub fn register(&mut self, kind: ActorKind, name: &str, template: ActorTemplate) {
        self.templates.insert((kind, name.to_string()), template);
    }

    pub fn template(&self, kind: ActorKind, name: &str) -> Option<&ActorTemplate> {
        match kind {
            ActorKind::Player => Some(&self.player_template),
            ActorKind::Extra => Some(
                self.templates
                    .get(&(kind, name.to_string()))
                    .unwrap_or(&self.extra_template),
            ),
            _ => self.templates.get(&(kind, name.to_string())),
        }
    }

    /// Build an actor from its template and add it to the registry.
    /// Fails only when an enemy/boss type is unknown.
    pub fn spawn(&self, registry: &mut EntityRegistry, request: SpawnRequest) -> Result<ActorId, String> {
        let template = self
            .template(request.kind, &request.template)
            .ok_or_else(|| format!("Unknown {} type '{}'", request.kind, request.template))?;

        let id = registry.allocate_id();
        let mut actor = Actor::new(id, request.kind, request.position);
        actor.symbolic_id = request.symbolic_id;
        actor.meta.template = request.template;
        actor.meta.spawned_by = request.spawned_by;
        actor.health = request.health.unwrap_or(template.health);
        actor.max_health = actor.health.max(template.health);
        actor.size = template.size;
        actor.color = template.color;
        actor.gravity = template.gravity;
        if let Some(facing) = request.facing {
            actor.facing = facing.signum();
        }

        debug!(
            "Spawned {} '{}' {} at ({:.0}, {:.0})",
            actor.kind, actor.meta.template, id, actor.position.x, actor.position.y
        );
        Ok(registry.add(actor))
    }
}
