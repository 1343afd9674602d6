//! Bevy integration
//!
//! `SequencerPlugin` owns the stage, the director and the loaded level's
//! sequences as resources, ticks them from `Time`, and (unless headless)
//! mirrors stage actors into sprites.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::config_watcher::{SequenceFileWatcher, check_sequence_file_changes};
use crate::constants::*;
use crate::events::{SequenceEvent, serialize_event};
use crate::sequence::{SequenceDatabase, SequenceDirector};
use crate::settings::SequencerSettings;
use crate::stage::{Actor, ActorId, Stage};

/// Name of the level whose sequences are loaded
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct CurrentLevel(pub String);

/// Links a sprite entity to the stage actor it draws
#[derive(Component, Debug, Clone, Copy)]
pub struct ActorSprite(pub ActorId);

/// Actor -> sprite entity
#[derive(Resource, Debug, Default)]
pub struct ActorSprites(pub HashMap<ActorId, Entity>);

pub struct SequencerPlugin {
    pub level: String,
    /// Spawn sprites for stage actors (off for headless runs)
    pub sprites: bool,
}

impl Default for SequencerPlugin {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            sprites: true,
        }
    }
}

impl SequencerPlugin {
    pub fn headless(level: &str) -> Self {
        Self {
            level: level.to_string(),
            sprites: false,
        }
    }
}

impl Plugin for SequencerPlugin {
    fn build(&self, app: &mut App) {
        let settings = SequencerSettings::load();
        let database = SequenceDatabase::load_level(&self.level);
        let mut director = SequenceDirector::new(settings.clone());
        director.register_sequences(database.sequences.clone());

        app.insert_resource(SequenceFileWatcher::new(&database))
            .insert_resource(settings)
            .insert_resource(database)
            .insert_resource(director)
            .insert_resource(CurrentLevel(self.level.clone()))
            .init_resource::<Stage>()
            .add_systems(
                Update,
                (tick_sequencer, handle_level_requests, log_sequence_events).chain(),
            )
            .add_systems(Update, check_sequence_file_changes);

        if self.sprites {
            app.init_resource::<ActorSprites>()
                .add_systems(PostUpdate, sync_actor_sprites);
        }
    }
}

/// Advance the stage and the director by the frame delta
pub fn tick_sequencer(
    time: Res<Time>,
    mut stage: ResMut<Stage>,
    mut director: ResMut<SequenceDirector>,
) {
    let dt_ms = time.delta_secs() * 1000.0;
    director.update(&mut stage, dt_ms);
}

/// Swap levels when a `loadLevel` action asked for one
pub fn handle_level_requests(
    mut stage: ResMut<Stage>,
    mut director: ResMut<SequenceDirector>,
    mut database: ResMut<SequenceDatabase>,
    mut watcher: ResMut<SequenceFileWatcher>,
    mut level: ResMut<CurrentLevel>,
) {
    let Some(next) = stage.pending_level.take() else {
        return;
    };
    info!("Loading level '{}' (was '{}')", next, level.0);

    director.clear(&mut stage);
    stage.reset();
    *database = SequenceDatabase::load_level(&next);
    director.register_sequences(database.sequences.clone());
    watcher.watch_level(&database);
    stage.spawn_player(Vec2::new(PLAYER_START_X, GROUND_Y));
    level.0 = next;
}

/// Drain the director's event bus into the log
pub fn log_sequence_events(mut director: ResMut<SequenceDirector>) {
    for entry in director.events.drain() {
        let line = serialize_event(entry.time_ms, &entry.event);
        match entry.event {
            SequenceEvent::Started { .. }
            | SequenceEvent::Completed { .. }
            | SequenceEvent::Abandoned { .. }
            | SequenceEvent::Chained { .. }
            | SequenceEvent::LevelRequested { .. } => info!("{}", line),
            _ => debug!("{}", line),
        }
    }
}

/// Stage coordinates (y down, origin at the world's top-left) to view space
/// (y up, origin at the screen center)
pub fn stage_to_view(stage: &Stage, point: Vec2) -> Vec2 {
    let camera = &stage.camera;
    let offset = (point - camera.center()) * camera.zoom;
    Vec2::new(offset.x, -offset.y)
}

/// Sprite color after the actor's appearance override
pub fn actor_color(actor: &Actor) -> Color {
    let base = actor.color.to_srgba();
    let tint = actor.appearance.tint.to_srgba();
    Color::srgba(
        base.red * tint.red,
        base.green * tint.green,
        base.blue * tint.blue,
        actor.appearance.alpha,
    )
}

fn actor_translation(stage: &Stage, actor: &Actor) -> Vec3 {
    // Position is the actor's feet; sprites are centered
    let center = actor.position - Vec2::new(0.0, actor.size.y * 0.5);
    let view = stage_to_view(stage, center);
    view.extend(1.0 + actor.appearance.depth * DEPTH_TO_Z)
}

/// Mirror stage actors into sprite entities
pub fn sync_actor_sprites(
    mut commands: Commands,
    stage: Res<Stage>,
    mut sprites: ResMut<ActorSprites>,
    mut query: Query<(&mut Transform, &mut Sprite), With<ActorSprite>>,
) {
    sprites.0.retain(|id, entity| {
        let keep = stage.registry.is_live(*id);
        if !keep {
            commands.entity(*entity).despawn();
        }
        keep
    });

    for actor in stage.registry.iter().filter(|a| a.is_live()) {
        let translation = actor_translation(&stage, actor);
        let color = actor_color(actor);
        let size = actor.size * stage.camera.zoom;
        let existing = sprites.0.get(&actor.id).and_then(|e| query.get_mut(*e).ok());
        match existing {
            Some((mut transform, mut sprite)) => {
                transform.translation = translation;
                sprite.color = color;
                sprite.custom_size = Some(size);
                sprite.flip_x = actor.facing < 0.0;
            }
            None => {
                let entity = commands
                    .spawn((
                        Sprite::from_color(color, size),
                        Transform::from_translation(translation),
                        ActorSprite(actor.id),
                    ))
                    .id();
                sprites.0.insert(actor.id, entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::app::ScheduleRunnerPlugin;
    use std::time::Duration;

    fn headless_app() -> App {
        let mut app = App::new();
        app.add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f32(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(SequencerPlugin::headless(DEFAULT_LEVEL));
        app
    }

    #[test]
    fn test_plugin_inserts_resources() {
        let app = headless_app();
        let world = app.world();
        assert!(world.contains_resource::<Stage>());
        assert!(world.contains_resource::<SequenceDirector>());
        assert!(world.contains_resource::<SequenceDatabase>());
        assert!(world.contains_resource::<SequencerSettings>());
        assert!(!world.resource::<SequenceDirector>().sequences().is_empty());
        assert_eq!(world.resource::<CurrentLevel>().0, DEFAULT_LEVEL);
    }

    #[test]
    fn test_level_request_swaps_level() {
        let mut app = headless_app();
        app.world_mut().resource_mut::<Stage>().pending_level = Some("nowhere".to_string());
        app.update();

        let world = app.world();
        assert_eq!(world.resource::<CurrentLevel>().0, "nowhere");
        assert!(world.resource::<SequenceDatabase>().is_empty());
        assert!(world.resource::<Stage>().pending_level.is_none());
        assert!(world.resource::<Stage>().registry.player().is_some());
    }

    #[test]
    fn test_view_mapping_centers_camera() {
        let mut stage = Stage::default();
        stage.spawn_player(Vec2::new(1_000.0, GROUND_Y));
        let center = stage.camera.center();
        assert_eq!(stage_to_view(&stage, center), Vec2::ZERO);
        let right = stage_to_view(&stage, center + Vec2::new(100.0, 50.0));
        assert_eq!(right, Vec2::new(100.0, -50.0));
    }
}
