//! Assertion checking for scenario expectations

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use super::parser::{ExpectedEvent, StateAssertion};
use crate::events::BusEvent;
use crate::sequence::SequenceDirector;
use crate::stage::Stage;

/// Error when an assertion fails
#[derive(Debug)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for AssertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n    Expected: {}\n    Actual: {}", self.message, self.expected, self.actual)
    }
}

/// Captured event with the frame it was drained on
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub frame: u64,
    pub code: &'static str,
    pub sequence: Option<String>,
}

impl CapturedEvent {
    pub fn from_bus_event(frame: u64, entry: &BusEvent) -> Self {
        Self {
            frame,
            code: entry.event.type_code(),
            sequence: entry.event.sequence().map(str::to_string),
        }
    }
}

/// Check that the expected events appear in order (other events may sit between)
pub fn check_sequence(expected: &[ExpectedEvent], captured: &[CapturedEvent]) -> Result<(), AssertionError> {
    let mut captured_idx = 0;

    for (i, exp) in expected.iter().enumerate() {
        let found = captured[captured_idx..].iter().enumerate().find(|(_, cap)| {
            cap.code == exp.event
                && exp
                    .sequence
                    .as_ref()
                    .is_none_or(|s| cap.sequence.as_ref() == Some(s))
        });

        match found {
            Some((offset, cap)) => {
                if let Some(min) = exp.frame_min
                    && cap.frame < min
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too early", i + 1, exp.event),
                        expected: format!("frame >= {}", min),
                        actual: format!("frame {}", cap.frame),
                    });
                }
                if let Some(max) = exp.frame_max
                    && cap.frame > max
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too late", i + 1, exp.event),
                        expected: format!("frame <= {}", max),
                        actual: format!("frame {}", cap.frame),
                    });
                }
                captured_idx += offset + 1;
            }
            None => {
                let sequence_str = exp
                    .sequence
                    .as_ref()
                    .map(|s| format!(" (sequence: {})", s))
                    .unwrap_or_default();
                return Err(AssertionError {
                    message: format!("Event #{} '{}'{} not found", i + 1, exp.event, sequence_str),
                    expected: format!("'{}' event in sequence", exp.event),
                    actual: format!(
                        "events after position {}: {:?}",
                        captured_idx,
                        captured[captured_idx..]
                            .iter()
                            .map(|e| match &e.sequence {
                                Some(s) => format!("{}:{}", e.code, s),
                                None => e.code.to_string(),
                            })
                            .collect::<Vec<_>>()
                    ),
                });
            }
        }
    }

    Ok(())
}

/// Stage and director state for assertions
#[derive(Debug, Clone)]
pub struct WorldState {
    pub player: Option<Vec2>,
    pub enemies: usize,
    pub bosses: usize,
    pub paused: usize,
    pub active: Option<String>,
    pub fired: HashSet<String>,
    pub input_enabled: bool,
    pub darkening: bool,
    pub dialogue: bool,
    pub fade: f32,
    /// Live actors with a symbolic id
    pub actors: HashMap<String, Vec2>,
}

impl WorldState {
    pub fn capture(stage: &Stage, director: &SequenceDirector) -> Self {
        let actors = stage
            .registry
            .iter()
            .filter(|a| a.is_live())
            .filter_map(|a| a.symbolic_id.clone().map(|id| (id, a.position)))
            .collect();
        let fired = director
            .sequences()
            .iter()
            .filter(|s| director.has_fired(&s.id))
            .map(|s| s.id.clone())
            .collect();
        Self {
            player: stage.player_position(),
            enemies: stage.registry.remaining_enemies(),
            bosses: stage.registry.remaining_bosses(),
            paused: director.pause_coordinator().paused_count(),
            active: director.active().map(|r| r.id.clone()),
            fired,
            input_enabled: stage.input_enabled,
            darkening: director.darkening().is_active(),
            dialogue: stage.dialogue.is_active(),
            fade: stage.camera.fade,
            actors,
        }
    }
}

/// Parse a check string into (path, operator, value)
fn parse_check(check: &str) -> Option<(&str, &str, &str)> {
    // Try operators in order of specificity (>= before >, etc.)
    for op in &[">=", "<=", "!=", "=", ">", "<"] {
        if let Some(idx) = check.find(op) {
            let path = check[..idx].trim();
            let value = check[idx + op.len()..].trim();
            return Some((path, op, value));
        }
    }
    None
}

/// Check state assertions against world state
///
/// Paths: `player.x`, `player.y`, `enemies`, `bosses`, `paused`, `fade`,
/// `active` (id or `none`), `fired.<id>`, `input_enabled`, `darkening`,
/// `dialogue`, `actor.<id>` (`alive`/`gone`), `actor.<id>.x`, `actor.<id>.y`
pub fn check_state(assertion: &StateAssertion, state: &WorldState) -> Result<(), AssertionError> {
    for check in &assertion.checks {
        let (path, operator, expected_value) = parse_check(check).ok_or_else(|| AssertionError {
            message: format!("Invalid check syntax: {}", check),
            expected: "format: 'path = value' or 'path > value'".to_string(),
            actual: check.clone(),
        })?;

        let path_parts: Vec<&str> = path.split('.').collect();

        match path_parts.as_slice() {
            ["player", axis] => {
                let player = state.player.ok_or_else(|| AssertionError {
                    message: "Player state check failed".to_string(),
                    expected: "player exists".to_string(),
                    actual: "no player".to_string(),
                })?;
                let value = if *axis == "y" { player.y } else { player.x };
                check_float_comparison(path, value, operator, expected_value)?;
            }
            ["enemies"] => check_float_comparison(path, state.enemies as f32, operator, expected_value)?,
            ["bosses"] => check_float_comparison(path, state.bosses as f32, operator, expected_value)?,
            ["paused"] => check_float_comparison(path, state.paused as f32, operator, expected_value)?,
            ["fade"] => check_float_comparison(path, state.fade, operator, expected_value)?,
            ["active"] => {
                let actual = state.active.as_deref().unwrap_or("none");
                check_text(check, actual, expected_value)?;
            }
            ["fired", id] => check_bool(check, state.fired.contains(*id), expected_value)?,
            ["input_enabled"] => check_bool(check, state.input_enabled, expected_value)?,
            ["darkening"] => check_bool(check, state.darkening, expected_value)?,
            ["dialogue"] => check_bool(check, state.dialogue, expected_value)?,
            ["actor", id] => {
                let actual = if state.actors.contains_key(*id) { "alive" } else { "gone" };
                check_text(check, actual, expected_value)?;
            }
            ["actor", id, axis] => {
                let position = state.actors.get(*id).ok_or_else(|| AssertionError {
                    message: format!("Actor '{}' not found", id),
                    expected: format!("actor '{}'", id),
                    actual: format!("available: {:?}", state.actors.keys().collect::<Vec<_>>()),
                })?;
                let value = if *axis == "y" { position.y } else { position.x };
                check_float_comparison(path, value, operator, expected_value)?;
            }
            _ => {
                return Err(AssertionError {
                    message: format!("Unknown check path: {}", path),
                    expected: "a known state path".to_string(),
                    actual: check.clone(),
                });
            }
        }
    }

    Ok(())
}

fn check_text(check: &str, actual: &str, expected: &str) -> Result<(), AssertionError> {
    let expected = expected.trim_matches('"');
    if actual != expected {
        return Err(AssertionError {
            message: format!("Check failed: {}", check),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn check_bool(check: &str, actual: bool, expected: &str) -> Result<(), AssertionError> {
    check_text(check, if actual { "true" } else { "false" }, expected)
}

/// Check float comparison with operator
fn check_float_comparison(path: &str, actual: f32, operator: &str, expected_str: &str) -> Result<(), AssertionError> {
    let value: f32 = expected_str.trim().parse().map_err(|_| AssertionError {
        message: format!("Invalid value for {}", path),
        expected: "number".to_string(),
        actual: expected_str.to_string(),
    })?;

    let pass = match operator {
        ">=" => actual >= value,
        "<=" => actual <= value,
        ">" => actual > value,
        "<" => actual < value,
        "=" | "==" => (actual - value).abs() < 0.1,
        "!=" => (actual - value).abs() >= 0.1,
        _ => true,
    };

    if !pass {
        return Err(AssertionError {
            message: format!("Check failed: {} {} {} (actual: {:.1})", path, operator, expected_str, actual),
            expected: format!("{} {} {}", path, operator, value),
            actual: format!("{:.1}", actual),
        });
    }

    Ok(())
}
