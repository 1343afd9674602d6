//! Brawler demo - a walkable stage driven by scripted sequences
//!
//! Arrow keys / A-D walk, J attacks, Space advances dialogue.
//!
//! Usage:
//!   cargo run -- --level demo

use bevy::prelude::*;

use brawler_events::constants::*;
use brawler_events::plugin::{SequencerPlugin, tick_sequencer};
use brawler_events::sequence::SequenceDirector;
use brawler_events::settings::SequencerSettings;
use brawler_events::stage::{ActorKind, AnimState, Stage};

const ATTACK_RANGE: f32 = 80.0;
const ATTACK_DAMAGE: f32 = 15.0;
const ENGAGE_DISTANCE: f32 = 60.0;

#[derive(Component)]
struct DialoguePanel;

#[derive(Component)]
struct DialogueText;

#[derive(Component)]
struct FadeOverlay;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let level = args
        .iter()
        .position(|a| a == "--level")
        .and_then(|i| args.get(i + 1).cloned())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                resolution: bevy::window::WindowResolution::new(
                    VIEWPORT_WIDTH as u32,
                    VIEWPORT_HEIGHT as u32,
                )
                .with_scale_factor_override(1.0),
                title: "Brawler Events".into(),
                resizable: false,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(SequencerPlugin {
            level,
            sprites: true,
        })
        .insert_resource(ClearColor(BACKGROUND_COLOR))
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (player_input, enemy_ai, dialogue_input).before(tick_sequencer),
        )
        .add_systems(
            Update,
            (reap_defeated, play_sound_cues, update_dialogue_ui, update_fade_overlay)
                .after(tick_sequencer),
        )
        .run();
}

fn setup(mut commands: Commands, mut stage: ResMut<Stage>, settings: Res<SequencerSettings>) {
    commands.spawn(Camera2d);
    stage.spawn_player(Vec2::new(PLAYER_START_X, GROUND_Y));

    let panel_z = 1.0 + settings.dialogue_depth * DEPTH_TO_Z;
    let panel_y = -VIEWPORT_HEIGHT * 0.5 + 70.0;
    commands.spawn((
        Sprite::from_color(Color::srgba(0.05, 0.05, 0.08, 0.9), Vec2::new(VIEWPORT_WIDTH - 40.0, 110.0)),
        Transform::from_xyz(0.0, panel_y, panel_z),
        Visibility::Hidden,
        DialoguePanel,
    ));
    commands.spawn((
        Text2d::new(""),
        TextFont {
            font_size: 22.0,
            ..default()
        },
        TextLayout::new_with_justify(bevy::text::Justify::Left),
        TextColor(Color::srgb(0.95, 0.92, 0.85)),
        Transform::from_xyz(0.0, panel_y, panel_z + 0.05),
        Visibility::Hidden,
        DialogueText,
    ));
    commands.spawn((
        Sprite::from_color(Color::srgba(0.0, 0.0, 0.0, 0.0), Vec2::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)),
        Transform::from_xyz(0.0, 0.0, FADE_OVERLAY_Z),
        FadeOverlay,
    ));
}

/// Walk and attack while input is enabled
fn player_input(keyboard: Res<ButtonInput<KeyCode>>, mut stage: ResMut<Stage>) {
    if !stage.input_enabled {
        return;
    }
    let mut move_x = 0.0;
    if keyboard.any_pressed([KeyCode::ArrowLeft, KeyCode::KeyA]) {
        move_x -= 1.0;
    }
    if keyboard.any_pressed([KeyCode::ArrowRight, KeyCode::KeyD]) {
        move_x += 1.0;
    }

    let Some(player) = stage.registry.player_mut() else {
        return;
    };
    if !player.physics_enabled {
        return;
    }
    player.velocity.x = move_x * PLAYER_WALK_SPEED;
    if move_x != 0.0 {
        player.facing = move_x;
        player.anim = AnimState::Walk;
    } else if player.anim == AnimState::Walk {
        player.anim = AnimState::Idle;
    }
    let player_x = player.position.x;
    let facing = player.facing;

    if keyboard.just_pressed(KeyCode::KeyJ) {
        let target = stage
            .registry
            .combatant_ids()
            .into_iter()
            .filter_map(|id| stage.registry.get(id).map(|a| (id, a.position.x - player_x)))
            .filter(|(_, dx)| dx.abs() <= ATTACK_RANGE && dx.signum() == facing.signum())
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
        if let Some((id, _)) = target {
            stage.damage(id, ATTACK_DAMAGE);
        }
    }
}

/// Enemies with AI on close in on the player
fn enemy_ai(mut stage: ResMut<Stage>) {
    let Some(player_x) = stage.player_x() else {
        return;
    };
    for actor in stage.registry.iter_mut() {
        if !actor.kind.is_combatant() || !actor.is_live() || !actor.ai_enabled || !actor.physics_enabled {
            continue;
        }
        if actor.health <= 0.0 {
            continue;
        }
        let dx = player_x - actor.position.x;
        if dx.abs() > ENGAGE_DISTANCE {
            actor.velocity.x = dx.signum() * ENEMY_WALK_SPEED;
            actor.facing = dx.signum();
            actor.anim = AnimState::Walk;
        } else {
            actor.velocity.x = 0.0;
            actor.anim = AnimState::Attack;
        }
    }
}

fn dialogue_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut stage: ResMut<Stage>,
    mut director: ResMut<SequenceDirector>,
) {
    if stage.dialogue.is_active() && keyboard.any_just_pressed([KeyCode::Space, KeyCode::Enter]) {
        director.advance_dialogue(&mut stage);
    }
}

fn reap_defeated(mut stage: ResMut<Stage>) {
    for actor in stage.reap_defeated() {
        if actor.kind == ActorKind::Boss {
            info!("Boss {} down", actor.id);
        }
    }
}

/// No mixer in the demo; cues are logged
fn play_sound_cues(mut stage: ResMut<Stage>) {
    for cue in stage.take_sound_cues() {
        info!("Sound cue '{}' at volume {:.2}", cue.key, cue.volume);
    }
}

fn update_dialogue_ui(
    stage: Res<Stage>,
    mut panel: Query<&mut Visibility, (With<DialoguePanel>, Without<DialogueText>)>,
    mut text: Query<(&mut Text2d, &mut Visibility), With<DialogueText>>,
) {
    let visibility = if stage.dialogue.is_active() {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };
    for mut panel_visibility in &mut panel {
        *panel_visibility = visibility;
    }
    for (mut line, mut text_visibility) in &mut text {
        *text_visibility = visibility;
        let content = match (stage.dialogue.speaker(), stage.dialogue.current_line()) {
            (Some(speaker), Some(current)) => format!("{}: {}", speaker, current),
            (None, Some(current)) => current.to_string(),
            _ => String::new(),
        };
        if line.0 != content {
            line.0 = content;
        }
    }
}

fn update_fade_overlay(stage: Res<Stage>, mut overlay: Query<&mut Sprite, With<FadeOverlay>>) {
    for mut sprite in &mut overlay {
        sprite.color = Color::srgba(0.0, 0.0, 0.0, stage.camera.fade);
    }
}
