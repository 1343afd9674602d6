//! Sequencer settings
//!
//! Timeouts, poll cadence, trigger tolerances and the darkening look are all
//! configuration rather than hardcoded gameplay constants. Values live in
//! `config/sequencer_settings.json`; any missing field falls back to the
//! default in `constants.rs`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::*;

fn default_advance_delay_ms() -> f32 {
    ADVANCE_DELAY_MS
}
fn default_poll_interval_ms() -> f32 {
    POLL_INTERVAL_MS
}
fn default_condition_timeout_ms() -> f32 {
    CONDITION_TIMEOUT_MS
}
fn default_max_condition_timeout_ms() -> f32 {
    MAX_CONDITION_TIMEOUT_MS
}
fn default_tween_safety_margin_ms() -> f32 {
    TWEEN_SAFETY_MARGIN_MS
}
fn default_dialogue_timeout_ms() -> f32 {
    DIALOGUE_TIMEOUT_MS
}
fn default_existence_check_delay_ms() -> f32 {
    EXISTENCE_CHECK_DELAY_MS
}
fn default_move_duration_ms() -> f32 {
    DEFAULT_MOVE_DURATION_MS
}
fn default_wait_ms() -> f32 {
    DEFAULT_WAIT_MS
}
fn default_random_wait_min_ms() -> f32 {
    RANDOM_WAIT_MIN_MS
}
fn default_random_wait_max_ms() -> f32 {
    RANDOM_WAIT_MAX_MS
}
fn default_offscreen_margin() -> f32 {
    OFFSCREEN_MARGIN
}
fn default_position_tolerance() -> f32 {
    POSITION_TOLERANCE
}
fn default_percentage_tolerance() -> f32 {
    PERCENTAGE_TOLERANCE
}
fn default_camera_end_tolerance() -> f32 {
    CAMERA_END_TOLERANCE
}
fn default_true() -> bool {
    true
}
fn default_darken_tint() -> [f32; 3] {
    DARKEN_TINT
}
fn default_darken_alpha() -> f32 {
    DARKEN_ALPHA
}
fn default_dialogue_depth() -> f32 {
    DIALOGUE_DEPTH
}
fn default_highlight_depth_offset() -> f32 {
    HIGHLIGHT_DEPTH_OFFSET
}

/// All tunable sequencer values
#[derive(Debug, Clone, Serialize, Deserialize, Resource)]
pub struct SequencerSettings {
    // Interpreter timing (ms)
    #[serde(default = "default_advance_delay_ms")]
    pub advance_delay_ms: f32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: f32,
    #[serde(default = "default_condition_timeout_ms")]
    pub condition_timeout_ms: f32,
    #[serde(default = "default_max_condition_timeout_ms")]
    pub max_condition_timeout_ms: f32,
    #[serde(default = "default_tween_safety_margin_ms")]
    pub tween_safety_margin_ms: f32,
    #[serde(default = "default_dialogue_timeout_ms")]
    pub dialogue_timeout_ms: f32,
    #[serde(default = "default_existence_check_delay_ms")]
    pub existence_check_delay_ms: f32,

    // Action defaults
    #[serde(default = "default_move_duration_ms")]
    pub default_move_duration_ms: f32,
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: f32,
    #[serde(default = "default_random_wait_min_ms")]
    pub random_wait_min_ms: f32,
    #[serde(default = "default_random_wait_max_ms")]
    pub random_wait_max_ms: f32,
    #[serde(default = "default_offscreen_margin")]
    pub offscreen_margin: f32,

    // Trigger tolerances
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: f32,
    #[serde(default = "default_percentage_tolerance")]
    pub percentage_tolerance: f32,
    #[serde(default = "default_camera_end_tolerance")]
    pub camera_end_tolerance: f32,

    // Cinematic darkening
    #[serde(default = "default_true")]
    pub darken_enabled: bool,
    #[serde(default = "default_darken_tint")]
    pub darken_tint: [f32; 3],
    #[serde(default = "default_darken_alpha")]
    pub darken_alpha: f32,
    #[serde(default = "default_dialogue_depth")]
    pub dialogue_depth: f32,
    #[serde(default = "default_highlight_depth_offset")]
    pub highlight_depth_offset: f32,

    /// Auto-advance dialogue lines after this long (None = wait for input)
    #[serde(default)]
    pub dialogue_auto_advance_ms: Option<f32>,
    /// RNG seed for random waits and spawn loops (None = entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            advance_delay_ms: default_advance_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            condition_timeout_ms: default_condition_timeout_ms(),
            max_condition_timeout_ms: default_max_condition_timeout_ms(),
            tween_safety_margin_ms: default_tween_safety_margin_ms(),
            dialogue_timeout_ms: default_dialogue_timeout_ms(),
            existence_check_delay_ms: default_existence_check_delay_ms(),
            default_move_duration_ms: default_move_duration_ms(),
            default_wait_ms: default_wait_ms(),
            random_wait_min_ms: default_random_wait_min_ms(),
            random_wait_max_ms: default_random_wait_max_ms(),
            offscreen_margin: default_offscreen_margin(),
            position_tolerance: default_position_tolerance(),
            percentage_tolerance: default_percentage_tolerance(),
            camera_end_tolerance: default_camera_end_tolerance(),
            darken_enabled: true,
            darken_tint: default_darken_tint(),
            darken_alpha: default_darken_alpha(),
            dialogue_depth: default_dialogue_depth(),
            highlight_depth_offset: default_highlight_depth_offset(),
            dialogue_auto_advance_ms: None,
            seed: None,
        }
    }
}

impl SequencerSettings {
    /// Load settings from the default location, or defaults if missing/invalid
    pub fn load() -> Self {
        let path = Path::new(SEQUENCER_SETTINGS_FILE);
        if !path.exists() {
            info!("No {} found, using default sequencer settings", SEQUENCER_SETTINGS_FILE);
            return Self::default();
        }
        match Self::load_from_file(SEQUENCER_SETTINGS_FILE) {
            Ok(settings) => {
                info!("Loaded sequencer settings from {}", SEQUENCER_SETTINGS_FILE);
                settings
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings from a JSON file
    pub fn load_from_file(path: &str) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
        Self::parse(&contents).map_err(|e| format!("Failed to parse {}: {}", path, e))
    }

    /// Parse settings from a JSON string
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Longest any suspension may last before it is forced on
    pub fn max_suspension_ms(&self) -> f32 {
        self.max_condition_timeout_ms.max(MIN_SUSPENSION_TIMEOUT_MS)
    }

    /// Clamp a timeout to the allowed window. Non-finite values get the ceiling.
    pub fn clamp_timeout(&self, timeout_ms: f32) -> f32 {
        if timeout_ms.is_nan() {
            return self.max_suspension_ms();
        }
        timeout_ms.clamp(MIN_SUSPENSION_TIMEOUT_MS, self.max_suspension_ms())
    }

    /// Timeout for a condition-wait, clamped to the allowed window
    pub fn condition_timeout(&self, requested: Option<f32>) -> f32 {
        self.clamp_timeout(requested.unwrap_or(self.condition_timeout_ms))
    }

    /// Safety timeout for something expected to finish after `duration_ms`
    pub fn tween_timeout(&self, duration_ms: f32) -> f32 {
        self.clamp_timeout(duration_ms.max(0.0) + self.tween_safety_margin_ms)
    }

    /// Safety timeout for an open dialogue
    pub fn dialogue_timeout(&self) -> f32 {
        self.clamp_timeout(self.dialogue_timeout_ms)
    }

    /// Tint applied to darkened combatants
    pub fn darken_color(&self) -> Color {
        let [r, g, b] = self.darken_tint;
        Color::srgb(r, g, b)
    }

    /// Depth that highlighted actors are raised to during darkening
    pub fn highlight_depth(&self) -> f32 {
        self.dialogue_depth + self.highlight_depth_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = SequencerSettings::parse(r#"{ "poll_interval_ms": 50.0 }"#).unwrap();
        assert_eq!(settings.poll_interval_ms, 50.0);
        assert_eq!(settings.advance_delay_ms, ADVANCE_DELAY_MS);
        assert_eq!(settings.position_tolerance, POSITION_TOLERANCE);
        assert!(settings.darken_enabled);
        assert!(settings.seed.is_none());
    }

    #[test]
    fn test_condition_timeout_is_clamped() {
        let settings = SequencerSettings::default();
        assert_eq!(settings.condition_timeout(None), CONDITION_TIMEOUT_MS);
        assert_eq!(settings.condition_timeout(Some(10.0)), MIN_SUSPENSION_TIMEOUT_MS);
        assert_eq!(
            settings.condition_timeout(Some(600_000.0)),
            MAX_CONDITION_TIMEOUT_MS
        );
    }

    #[test]
    fn test_tween_timeout_adds_margin() {
        let settings = SequencerSettings::default();
        assert_eq!(settings.tween_timeout(2_000.0), 2_000.0 + TWEEN_SAFETY_MARGIN_MS);
        assert!(settings.tween_timeout(0.0) >= MIN_SUSPENSION_TIMEOUT_MS);
    }

    #[test]
    fn test_tween_timeout_never_exceeds_ceiling() {
        let settings = SequencerSettings::default();
        assert_eq!(settings.tween_timeout(300_000.0), MAX_CONDITION_TIMEOUT_MS);
        assert_eq!(settings.tween_timeout(f32::INFINITY), MAX_CONDITION_TIMEOUT_MS);
        assert_eq!(settings.clamp_timeout(f32::NAN), MAX_CONDITION_TIMEOUT_MS);

        let slow_dialogue = SequencerSettings {
            dialogue_timeout_ms: 1.0e9,
            ..Default::default()
        };
        assert_eq!(slow_dialogue.dialogue_timeout(), MAX_CONDITION_TIMEOUT_MS);
    }
}
