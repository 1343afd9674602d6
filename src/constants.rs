//! Tunable constants for the event sequencer
//!
//! Defaults for everything `SequencerSettings` can override, plus the
//! fixed sizes/colors used by the stage and the demo binaries.

use bevy::prelude::*;

// =============================================================================
// FILE LOCATIONS
// =============================================================================

/// Directory holding one `<level>.json` sequence file per level
pub const SEQUENCES_DIR: &str = "assets/sequences";
/// Sequencer settings (timeouts, tolerances, darkening look)
pub const SEQUENCER_SETTINGS_FILE: &str = "config/sequencer_settings.json";
/// Level loaded by the demo binaries when none is given
pub const DEFAULT_LEVEL: &str = "demo";

// =============================================================================
// TRIGGER TOLERANCES
// =============================================================================

pub const POSITION_TOLERANCE: f32 = 50.0; // px either side of the trigger value
pub const PERCENTAGE_TOLERANCE: f32 = 0.02; // fraction of world width
pub const CAMERA_END_TOLERANCE: f32 = 10.0; // px short of the world's right edge

// =============================================================================
// INTERPRETER TIMING (milliseconds)
// =============================================================================

pub const ADVANCE_DELAY_MS: f32 = 10.0; // gap between one action completing and the next dispatching
pub const POLL_INTERVAL_MS: f32 = 100.0; // condition-wait and darkening monitor cadence
pub const CONDITION_TIMEOUT_MS: f32 = 30_000.0;
pub const MAX_CONDITION_TIMEOUT_MS: f32 = 60_000.0;
pub const MIN_SUSPENSION_TIMEOUT_MS: f32 = 500.0;
pub const TWEEN_SAFETY_MARGIN_MS: f32 = 1_000.0; // added to tween/wait durations for the safety timeout
pub const DIALOGUE_TIMEOUT_MS: f32 = 60_000.0;
pub const EXISTENCE_CHECK_DELAY_MS: f32 = 100.0;

pub const DEFAULT_MOVE_DURATION_MS: f32 = 1_000.0;
pub const DEFAULT_WAIT_MS: f32 = 1_000.0;
pub const RANDOM_WAIT_MIN_MS: f32 = 500.0;
pub const RANDOM_WAIT_MAX_MS: f32 = 1_500.0;
pub const DEFAULT_FADE_MS: f32 = 500.0;
pub const DEFAULT_CAMERA_MS: f32 = 1_000.0;

// =============================================================================
// STAGE GEOMETRY
// =============================================================================

pub const DEFAULT_WORLD_WIDTH: f32 = 4_000.0;
pub const DEFAULT_WORLD_HEIGHT: f32 = 600.0;
pub const VIEWPORT_WIDTH: f32 = 800.0;
pub const VIEWPORT_HEIGHT: f32 = 600.0;
pub const GROUND_Y: f32 = 450.0; // default spawn lane (y grows downward)
pub const OFFSCREEN_MARGIN: f32 = 100.0;
pub const PLAYER_START_X: f32 = 120.0;

pub const PLAYER_SIZE: Vec2 = Vec2::new(48.0, 96.0);
pub const ENEMY_SIZE: Vec2 = Vec2::new(48.0, 96.0);
pub const BOSS_SIZE: Vec2 = Vec2::new(80.0, 140.0);
pub const EXTRA_SIZE: Vec2 = Vec2::new(40.0, 90.0);

pub const PLAYER_WALK_SPEED: f32 = 220.0; // px/sec
pub const ENEMY_WALK_SPEED: f32 = 90.0;
pub const SPAWN_LOOP_SPEED: f32 = 120.0; // background walkers

// =============================================================================
// PRESENTATION
// =============================================================================

pub const DIALOGUE_DEPTH: f32 = 1_000.0; // z of the dialogue box
pub const HIGHLIGHT_DEPTH_OFFSET: f32 = 10.0; // highlighted actors sit this far above the dialogue
pub const DEPTH_TO_Z: f32 = 0.01; // stage depth -> sprite z (keeps the box inside the 2d far plane)
pub const FADE_OVERLAY_Z: f32 = 50.0;
pub const DARKEN_ALPHA: f32 = 0.45;
pub const DARKEN_TINT: [f32; 3] = [0.35, 0.35, 0.4];

pub const PLAYER_COLOR: Color = Color::srgb(0.3, 0.6, 0.95);
pub const ENEMY_COLOR: Color = Color::srgb(0.85, 0.3, 0.25);
pub const BOSS_COLOR: Color = Color::srgb(0.6, 0.15, 0.5);
pub const EXTRA_COLOR: Color = Color::srgb(0.85, 0.75, 0.4);
pub const BACKGROUND_COLOR: Color = Color::srgb(0.16, 0.15, 0.18);
