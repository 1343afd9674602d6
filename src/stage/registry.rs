//! Entity registry - symbolic ids over the live actor collections
//!
//! Each category (enemies, bosses, extras) is a dense `Vec<Actor>` plus a
//! symbolic-id → index map. Removing an actor compacts the vector and
//! re-bases the map in the same `&mut self` call, so no caller can ever
//! observe an index that points past the splice.
//!
//! Target strings resolve in three steps: protection record, id map,
//! numeric position. Every step re-checks liveness, and stale entries found
//! along the way are pruned.

use bevy::prelude::*;
use std::collections::HashMap;

use super::actor::{Actor, ActorId, ActorKind, ProtectionLevel};

/// Parsed form of a target string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef<'a> {
    Player,
    Enemy(&'a str),
    Boss(&'a str),
    Extra(&'a str),
    Character(&'a str),
    /// No recognised prefix - matched against ids in every collection
    Bare(&'a str),
}

impl<'a> TargetRef<'a> {
    pub fn parse(target: &'a str) -> Self {
        let target = target.trim();
        if target == "player" {
            TargetRef::Player
        } else if let Some(key) = target.strip_prefix("enemy_") {
            TargetRef::Enemy(key)
        } else if target == "boss" {
            TargetRef::Boss("")
        } else if let Some(key) = target.strip_prefix("boss_") {
            TargetRef::Boss(key)
        } else if let Some(key) = target.strip_prefix("extra_") {
            TargetRef::Extra(key)
        } else if let Some(name) = target.strip_prefix("character_") {
            TargetRef::Character(name)
        } else {
            TargetRef::Bare(target)
        }
    }
}

/// Protection bookkeeping for a sequence-owned actor
#[derive(Debug, Clone)]
pub struct ProtectionRecord {
    pub symbolic_id: String,
    pub actor: ActorId,
    pub level: ProtectionLevel,
    pub metadata: serde_json::Value,
}

/// One category of actors: dense storage plus id → index map
#[derive(Debug, Default)]
pub struct ActorRoster {
    actors: Vec<Actor>,
    ids: HashMap<String, usize>,
}

impl ActorRoster {
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.actors.iter_mut()
    }

    /// Raw id map entry (no liveness check)
    pub fn mapped_index(&self, symbolic_id: &str) -> Option<usize> {
        self.ids.get(symbolic_id).copied()
    }

    pub fn position_of(&self, id: ActorId) -> Option<usize> {
        self.actors.iter().position(|a| a.id == id)
    }

    /// Append an actor, claiming its symbolic id if it has one
    fn push(&mut self, mut actor: Actor) -> usize {
        let index = self.actors.len();
        if let Some(symbolic) = actor.symbolic_id.clone() {
            if let Some(previous) = self.lookup_id(&symbolic) {
                warn!(
                    "Symbolic id '{}' reassigned from {} to {}",
                    symbolic, self.actors[previous].id, actor.id
                );
                self.actors[previous].symbolic_id = None;
            }
            self.ids.insert(symbolic, index);
        }
        actor.active = true;
        self.actors.push(actor);
        index
    }

    /// Look up a symbolic id, pruning the entry if it no longer points at a
    /// live actor carrying that id
    pub fn lookup_id(&mut self, symbolic_id: &str) -> Option<usize> {
        let index = *self.ids.get(symbolic_id)?;
        match self.actors.get(index) {
            Some(actor) if actor.is_live() && actor.symbolic_id.as_deref() == Some(symbolic_id) => {
                Some(index)
            }
            _ => {
                debug!("Pruned stale id mapping '{}' -> {}", symbolic_id, index);
                self.ids.remove(symbolic_id);
                None
            }
        }
    }

    /// Splice out `index` and re-base the id map: entries at `index` are
    /// dropped, entries above it shift down by one.
    pub fn remove_at(&mut self, index: usize) -> Option<Actor> {
        if index >= self.actors.len() {
            return None;
        }
        let removed = self.actors.remove(index);
        self.ids.retain(|_, mapped| {
            if *mapped == index {
                return false;
            }
            if *mapped > index {
                *mapped -= 1;
            }
            true
        });
        Some(removed)
    }
}

/// All actors on the stage, by category
#[derive(Debug, Default)]
pub struct EntityRegistry {
    player: Option<Actor>,
    enemies: ActorRoster,
    bosses: ActorRoster,
    extras: ActorRoster,
    protection: HashMap<String, ProtectionRecord>,
    next_id: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh handle for an actor about to be added
    pub fn allocate_id(&mut self) -> ActorId {
        self.next_id += 1;
        ActorId(self.next_id)
    }

    /// Add an actor to the collection for its kind. A new player replaces
    /// the old one.
    pub fn add(&mut self, actor: Actor) -> ActorId {
        let id = actor.id;
        match actor.kind {
            ActorKind::Player => self.player = Some(actor),
            kind => {
                if let Some(roster) = self.roster_mut(kind) {
                    roster.push(actor);
                }
            }
        }
        id
    }

    pub fn roster(&self, kind: ActorKind) -> Option<&ActorRoster> {
        match kind {
            ActorKind::Player => None,
            ActorKind::Enemy => Some(&self.enemies),
            ActorKind::Boss => Some(&self.bosses),
            ActorKind::Extra => Some(&self.extras),
        }
    }

    fn roster_mut(&mut self, kind: ActorKind) -> Option<&mut ActorRoster> {
        match kind {
            ActorKind::Player => None,
            ActorKind::Enemy => Some(&mut self.enemies),
            ActorKind::Boss => Some(&mut self.bosses),
            ActorKind::Extra => Some(&mut self.extras),
        }
    }

    pub fn enemies(&self) -> &ActorRoster {
        &self.enemies
    }

    pub fn bosses(&self) -> &ActorRoster {
        &self.bosses
    }

    pub fn extras(&self) -> &ActorRoster {
        &self.extras
    }

    pub fn player(&self) -> Option<&Actor> {
        self.player.as_ref().filter(|p| p.is_live())
    }

    pub fn player_mut(&mut self) -> Option<&mut Actor> {
        self.player.as_mut().filter(|p| p.is_live())
    }

    pub fn player_id(&self) -> Option<ActorId> {
        self.player().map(|p| p.id)
    }

    /// Every actor, player first
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.player
            .iter()
            .chain(self.enemies.iter())
            .chain(self.bosses.iter())
            .chain(self.extras.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.player
            .iter_mut()
            .chain(self.enemies.iter_mut())
            .chain(self.bosses.iter_mut())
            .chain(self.extras.iter_mut())
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.iter_mut().find(|a| a.id == id)
    }

    pub fn is_live(&self, id: ActorId) -> bool {
        self.get(id).is_some_and(Actor::is_live)
    }

    /// Live actor ids of one kind, in collection order
    pub fn live_ids(&self, kind: ActorKind) -> Vec<ActorId> {
        match kind {
            ActorKind::Player => self.player_id().into_iter().collect(),
            _ => self
                .roster(kind)
                .map(|r| r.iter().filter(|a| a.is_live()).map(|a| a.id).collect())
                .unwrap_or_default(),
        }
    }

    /// Live enemies and bosses
    pub fn combatant_ids(&self) -> Vec<ActorId> {
        let mut ids = self.live_ids(ActorKind::Enemy);
        ids.extend(self.live_ids(ActorKind::Boss));
        ids
    }

    /// Enemies still in the fight
    pub fn remaining_enemies(&self) -> usize {
        self.enemies.iter().filter(|a| !a.is_defeated()).count()
    }

    /// Bosses still in the fight
    pub fn remaining_bosses(&self) -> usize {
        self.bosses.iter().filter(|a| !a.is_defeated()).count()
    }

    /// Record (or clear, for `ProtectionLevel::None`) a protection entry
    pub fn protect(
        &mut self,
        symbolic_id: &str,
        actor: ActorId,
        level: ProtectionLevel,
        metadata: serde_json::Value,
    ) {
        if let Some(target) = self.get_mut(actor) {
            target.protection = level;
        }
        if level.is_protected() {
            self.protection.insert(
                symbolic_id.to_string(),
                ProtectionRecord {
                    symbolic_id: symbolic_id.to_string(),
                    actor,
                    level,
                    metadata,
                },
            );
        } else {
            self.protection.remove(symbolic_id);
        }
    }

    pub fn protection_record(&self, symbolic_id: &str) -> Option<&ProtectionRecord> {
        self.protection.get(symbolic_id)
    }

    pub fn protection_count(&self) -> usize {
        self.protection.len()
    }

    /// Actor behind a protection record, dropping the record if it went stale
    fn protected_actor(&mut self, symbolic_id: &str) -> Option<ActorId> {
        let actor = self.protection.get(symbolic_id)?.actor;
        if self.is_live(actor) {
            Some(actor)
        } else {
            debug!("Pruned stale protection record '{}' -> {}", symbolic_id, actor);
            self.protection.remove(symbolic_id);
            None
        }
    }

    /// Resolve a target string to a live actor
    pub fn resolve(&mut self, target: &str) -> Option<ActorId> {
        let full = target.trim();
        match TargetRef::parse(full) {
            TargetRef::Player => self.player_id(),
            TargetRef::Enemy(key) => self.resolve_in(ActorKind::Enemy, full, key),
            TargetRef::Boss(key) => self.resolve_in(ActorKind::Boss, full, key),
            TargetRef::Extra(key) => self.resolve_in(ActorKind::Extra, full, key),
            TargetRef::Character(name) => self
                .protected_actor(full)
                .or_else(|| self.protected_actor(name))
                .or_else(|| {
                    self.iter()
                        .find(|a| a.is_live() && a.matches_name(name))
                        .map(|a| a.id)
                }),
            TargetRef::Bare(key) => {
                if key.is_empty() {
                    return None;
                }
                if let Some(id) = self.protected_actor(key) {
                    return Some(id);
                }
                for kind in [ActorKind::Enemy, ActorKind::Boss, ActorKind::Extra] {
                    if let Some(roster) = self.roster_mut(kind)
                        && let Some(index) = roster.lookup_id(key)
                    {
                        return Some(roster.actors[index].id);
                    }
                }
                self.player()
                    .filter(|p| p.symbolic_id.as_deref() == Some(key))
                    .map(|p| p.id)
            }
        }
    }

    fn resolve_in(&mut self, kind: ActorKind, full: &str, key: &str) -> Option<ActorId> {
        // (a) protection record by exact id
        if let Some(id) = self.protected_actor(full) {
            return Some(id);
        }
        if !key.is_empty()
            && let Some(id) = self.protected_actor(key)
            && self.get(id).is_some_and(|a| a.kind == kind)
        {
            return Some(id);
        }

        let roster = self.roster_mut(kind)?;

        // Bare category name ("boss") - first live member
        if key.is_empty() {
            return roster.iter().find(|a| a.is_live()).map(|a| a.id);
        }

        // (b) id map, with self-pruning
        if let Some(index) = roster.lookup_id(full).or_else(|| roster.lookup_id(key)) {
            return Some(roster.actors[index].id);
        }

        // (c) positional lookup
        let index = key.parse::<usize>().ok()?;
        roster.get(index).filter(|a| a.is_live()).map(|a| a.id)
    }

    /// Remove an actor from every structure that references it
    pub fn remove(&mut self, id: ActorId) -> Option<Actor> {
        let mut removed = if self.player.as_ref().is_some_and(|p| p.id == id) {
            self.player.take()
        } else {
            let kind = [ActorKind::Enemy, ActorKind::Boss, ActorKind::Extra]
                .into_iter()
                .find(|kind| {
                    self.roster(*kind)
                        .is_some_and(|r| r.position_of(id).is_some())
                })?;
            let roster = self.roster_mut(kind)?;
            let index = roster.position_of(id)?;
            roster.remove_at(index)
        }?;
        self.protection.retain(|_, record| record.actor != id);
        removed.active = false;
        removed.destroyed = true;
        Some(removed)
    }

    /// Drop everything (level teardown)
    pub fn clear(&mut self) {
        self.player = None;
        self.enemies = ActorRoster::default();
        self.bosses = ActorRoster::default();
        self.extras = ActorRoster::default();
        self.protection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enemy(registry: &mut EntityRegistry, symbolic: Option<&str>) -> ActorId {
        let id = registry.allocate_id();
        let mut actor = Actor::new(id, ActorKind::Enemy, Vec2::ZERO);
        actor.symbolic_id = symbolic.map(str::to_string);
        registry.add(actor)
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!(TargetRef::parse("player"), TargetRef::Player);
        assert_eq!(TargetRef::parse("enemy_2"), TargetRef::Enemy("2"));
        assert_eq!(TargetRef::parse("boss"), TargetRef::Boss(""));
        assert_eq!(TargetRef::parse("boss_king"), TargetRef::Boss("king"));
        assert_eq!(TargetRef::parse("extra_crowd"), TargetRef::Extra("crowd"));
        assert_eq!(TargetRef::parse("character_mom"), TargetRef::Character("mom"));
        assert_eq!(TargetRef::parse("critic"), TargetRef::Bare("critic"));
    }

    #[test]
    fn test_remove_rebases_id_map() {
        let mut registry = EntityRegistry::new();
        enemy(&mut registry, Some("a"));
        enemy(&mut registry, Some("b"));
        let c = enemy(&mut registry, Some("c"));
        enemy(&mut registry, Some("d"));

        let removed = registry.remove(registry.enemies().get(1).unwrap().id).unwrap();
        assert_eq!(removed.symbolic_id.as_deref(), Some("b"));
        assert!(removed.destroyed);

        let roster = registry.enemies();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.mapped_index("a"), Some(0));
        assert_eq!(roster.mapped_index("b"), None);
        assert_eq!(roster.mapped_index("c"), Some(1));
        assert_eq!(roster.mapped_index("d"), Some(2));
        assert_eq!(registry.resolve("enemy_c"), Some(c));
        assert_eq!(registry.resolve("c"), Some(c));
    }

    #[test]
    fn test_no_id_maps_to_removed_index() {
        let mut roster = ActorRoster::default();
        for (i, name) in ["x", "y", "z"].iter().enumerate() {
            let mut actor = Actor::new(ActorId(i as u64 + 1), ActorKind::Enemy, Vec2::ZERO);
            actor.symbolic_id = Some(name.to_string());
            roster.push(actor);
        }
        roster.remove_at(0).unwrap();
        assert!(roster.ids.values().all(|&i| i < roster.len()));
        assert_eq!(roster.mapped_index("y"), Some(0));
        assert_eq!(roster.mapped_index("z"), Some(1));
        assert!(roster.remove_at(5).is_none());
    }

    #[test]
    fn test_spawn_then_destroy_by_symbolic_id() {
        let mut registry = EntityRegistry::new();
        enemy(&mut registry, None);
        let critic = enemy(&mut registry, Some("enemy_critic"));
        let before = registry.enemies().len();

        let resolved = registry.resolve("enemy_critic").unwrap();
        assert_eq!(resolved, critic);
        registry.remove(resolved).unwrap();

        assert_eq!(registry.resolve("enemy_critic"), None);
        assert_eq!(registry.enemies().len(), before - 1);
    }

    #[test]
    fn test_positional_lookup_skips_inactive() {
        let mut registry = EntityRegistry::new();
        let first = enemy(&mut registry, None);
        let second = enemy(&mut registry, None);
        assert_eq!(registry.resolve("enemy_0"), Some(first));
        assert_eq!(registry.resolve("enemy_1"), Some(second));
        assert_eq!(registry.resolve("enemy_2"), None);

        registry.get_mut(second).unwrap().active = false;
        assert_eq!(registry.resolve("enemy_1"), None);
    }

    #[test]
    fn test_stale_id_mapping_is_pruned() {
        let mut registry = EntityRegistry::new();
        let id = enemy(&mut registry, Some("grunt"));
        registry.get_mut(id).unwrap().destroyed = true;

        assert_eq!(registry.resolve("enemy_grunt"), None);
        assert_eq!(registry.enemies().mapped_index("grunt"), None);
    }

    #[test]
    fn test_protection_record_resolves_first_and_heals() {
        let mut registry = EntityRegistry::new();
        let id = enemy(&mut registry, Some("enemy_guard"));
        registry.protect(
            "enemy_guard",
            id,
            ProtectionLevel::EventControlled,
            serde_json::Value::Null,
        );
        assert_eq!(registry.get(id).unwrap().protection, ProtectionLevel::EventControlled);
        assert_eq!(registry.resolve("enemy_guard"), Some(id));

        registry.get_mut(id).unwrap().active = false;
        assert_eq!(registry.resolve("enemy_guard"), None);
        assert!(registry.protection_record("enemy_guard").is_none());
    }

    #[test]
    fn test_remove_drops_protection_records() {
        let mut registry = EntityRegistry::new();
        let id = enemy(&mut registry, Some("enemy_vip"));
        registry.protect("enemy_vip", id, ProtectionLevel::Invulnerable, serde_json::Value::Null);
        assert_eq!(registry.protection_count(), 1);
        registry.remove(id);
        assert_eq!(registry.protection_count(), 0);
    }

    #[test]
    fn test_reassigned_symbolic_id_stays_unique() {
        let mut registry = EntityRegistry::new();
        let old = enemy(&mut registry, Some("twin"));
        let new = enemy(&mut registry, Some("twin"));
        assert_eq!(registry.resolve("twin"), Some(new));
        assert!(registry.get(old).unwrap().symbolic_id.is_none());
    }

    #[test]
    fn test_character_lookup_by_template() {
        let mut registry = EntityRegistry::new();
        let id = registry.allocate_id();
        let mut extra = Actor::new(id, ActorKind::Extra, Vec2::ZERO);
        extra.meta.template = "mom".to_string();
        registry.add(extra);
        assert_eq!(registry.resolve("character_mom"), Some(id));
        assert_eq!(registry.resolve("character_dad"), None);
    }
}
