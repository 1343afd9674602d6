//! Scenario execution engine
//!
//! Drives a `Stage` and a `SequenceDirector` directly at a fixed 60 fps
//! step, playing the host's part (player walking, enemies dying, dialogue
//! input) from the scenario's steps.

use bevy::prelude::*;

use crate::constants::*;
use crate::sequence::{SequenceDatabase, SequenceDirector};
use crate::settings::SequencerSettings;
use crate::stage::{ActorKind, DEFAULT_BOSS_TYPE, DEFAULT_ENEMY_TYPE, ProtectionLevel, SpawnRequest, Stage, WorldBounds};

use super::assertions::{AssertionError, CapturedEvent, WorldState, check_sequence, check_state};
use super::parser::{ScenarioDefinition, ScenarioSetup, ScenarioStep};

/// Fixed frame length
pub const FRAME_MS: f32 = 1000.0 / 60.0;

/// Frames run when the scenario names no later frame
const DEFAULT_MAX_FRAMES: u64 = 600;

/// Result of running a scenario
#[derive(Debug)]
pub enum TestResult {
    Pass { frames: u64 },
    Fail { error: AssertionError },
    Error { message: String },
}

/// Build the stage and director a scenario starts from
pub fn build_scenario(setup: &ScenarioSetup) -> Result<(Stage, SequenceDirector), String> {
    let dir = setup.sequences_dir.as_deref().unwrap_or(SEQUENCES_DIR);
    let path = SequenceDatabase::level_path(dir, &setup.level);
    let sequences = SequenceDatabase::load_from_file(&path)?;

    let settings = SequencerSettings {
        seed: Some(setup.seed.unwrap_or(0)),
        dialogue_auto_advance_ms: setup.dialogue_auto_advance_ms,
        ..Default::default()
    };

    let mut stage = Stage::default();
    if let Some(width) = setup.world_width {
        stage.set_world_bounds(WorldBounds::new(0.0, 0.0, width, DEFAULT_WORLD_HEIGHT));
    }
    stage.spawn_player(Vec2::new(setup.player_x, GROUND_Y));

    for def in &setup.actors {
        let template = def.template.clone().unwrap_or_else(|| {
            match def.kind {
                ActorKind::Boss => DEFAULT_BOSS_TYPE,
                ActorKind::Enemy => DEFAULT_ENEMY_TYPE,
                _ => "townsfolk",
            }
            .to_string()
        });
        let position = Vec2::new(def.x, def.y.unwrap_or(GROUND_Y));
        let request = SpawnRequest::new(def.kind, &template, position).with_id(def.id.clone());
        let actor = stage.spawn(request)?;
        if def.protected
            && let Some(id) = &def.id
        {
            stage
                .registry
                .protect(id, actor, ProtectionLevel::EventControlled, serde_json::Value::Null);
        }
    }

    let mut director = SequenceDirector::new(settings);
    director.register_sequences(sequences);
    Ok((stage, director))
}

/// Play one step's host actions
fn apply_step(stage: &mut Stage, director: &mut SequenceDirector, step: &ScenarioStep) {
    if let Some(x) = step.player_x {
        stage.set_player_x(x);
    }
    if let Some(target) = &step.kill {
        match stage.registry.resolve(target) {
            Some(id) => {
                stage.kill(id);
            }
            None => warn!("Scenario kill target '{}' not found", target),
        }
    }
    if step.kill_all_enemies {
        for id in stage.registry.combatant_ids() {
            stage.kill(id);
        }
    }
    if step.advance_dialogue {
        director.advance_dialogue(stage);
    }
    if let Some(id) = &step.trigger
        && !director.trigger_by_id(stage, id)
    {
        warn!("Scenario could not trigger '{}'", id);
    }
}

/// Run a single scenario and return the result
pub fn run_test(test: &ScenarioDefinition) -> TestResult {
    let (mut stage, mut director) = match build_scenario(&test.setup) {
        Ok(built) => built,
        Err(message) => return TestResult::Error { message },
    };

    let mut state_checks: Vec<_> = test.expect.state.iter().collect();
    state_checks.sort_by_key(|s| s.after_frame);

    let max_frame = test
        .expect
        .max_frames
        .into_iter()
        .chain(state_checks.iter().map(|s| s.after_frame))
        .chain(test.steps.iter().map(|s| s.frame))
        .max()
        .unwrap_or(DEFAULT_MAX_FRAMES);

    let mut walk_speed = 0.0;
    let mut captured = Vec::new();
    let mut next_check = 0;

    for frame in 0..=max_frame {
        for step in test.steps.iter().filter(|s| s.frame == frame) {
            if let Some(speed) = step.walk_speed {
                walk_speed = speed;
            }
            apply_step(&mut stage, &mut director, step);
        }

        if stage.input_enabled
            && let Some(player) = stage.registry.player_mut()
        {
            player.velocity.x = walk_speed;
            player.facing = if walk_speed < 0.0 { -1.0 } else { 1.0 };
        }

        director.update(&mut stage, FRAME_MS);
        stage.reap_defeated();
        // The runner stays on one level; the request is recorded as an event
        stage.pending_level = None;
        captured.extend(
            director
                .events
                .drain()
                .iter()
                .map(|entry| CapturedEvent::from_bus_event(frame, entry)),
        );

        while let Some(assertion) = state_checks.get(next_check)
            && assertion.after_frame == frame
        {
            let state = WorldState::capture(&stage, &director);
            if let Err(error) = check_state(assertion, &state) {
                return TestResult::Fail { error };
            }
            next_check += 1;
        }
    }

    match check_sequence(&test.expect.sequence, &captured) {
        Ok(()) => TestResult::Pass { frames: max_frame + 1 },
        Err(error) => TestResult::Fail { error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SCENARIOS_DIR, discover_scenarios, parse_scenario_file};
    use std::path::Path;

    #[test]
    fn test_bundled_scenarios_pass() {
        let files = discover_scenarios(Path::new(SCENARIOS_DIR));
        assert!(!files.is_empty(), "no scenarios under {}", SCENARIOS_DIR);
        let mut failures = Vec::new();
        for path in files {
            let scenario = match parse_scenario_file(&path) {
                Ok(scenario) => scenario,
                Err(e) => {
                    failures.push(e);
                    continue;
                }
            };
            match run_test(&scenario) {
                TestResult::Pass { .. } => {}
                TestResult::Fail { error } => failures.push(format!("{}: {}", scenario.name, error)),
                TestResult::Error { message } => failures.push(format!("{}: {}", scenario.name, message)),
            }
        }
        assert!(failures.is_empty(), "{}", failures.join("\n"));
    }

    #[test]
    fn test_missing_sequence_file_is_error() {
        let scenario: ScenarioDefinition = toml::from_str(
            r#"
name = "Missing"
[setup]
level = "nowhere"
sequences_dir = "does/not/exist"
"#,
        )
        .unwrap();
        assert!(matches!(run_test(&scenario), TestResult::Error { .. }));
    }
}
