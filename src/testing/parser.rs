//! TOML scenario file parsing

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants::PLAYER_START_X;
use crate::stage::ActorKind;

/// Complete scenario definition from a TOML file
#[derive(Debug, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    pub description: Option<String>,
    pub setup: ScenarioSetup,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub expect: ScenarioExpectations,
}

/// Stage and director setup
#[derive(Debug, Deserialize)]
pub struct ScenarioSetup {
    /// Level name, resolved to `<sequences_dir>/<level>.json`
    pub level: String,
    pub sequences_dir: Option<String>,
    #[serde(default = "default_player_x")]
    pub player_x: f32,
    pub world_width: Option<f32>,
    pub seed: Option<u64>,
    pub dialogue_auto_advance_ms: Option<f32>,
    #[serde(default)]
    pub actors: Vec<ActorDef>,
}

fn default_player_x() -> f32 {
    PLAYER_START_X
}

/// Actor placed on the stage before the first frame
#[derive(Debug, Clone, Deserialize)]
pub struct ActorDef {
    pub kind: ActorKind,
    pub template: Option<String>,
    pub x: f32,
    pub y: Option<f32>,
    /// Symbolic id
    pub id: Option<String>,
    #[serde(default)]
    pub protected: bool,
}

/// Scripted host behavior starting at a frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioStep {
    pub frame: u64,
    /// Player walk speed in px/sec, held until changed
    pub walk_speed: Option<f32>,
    /// Teleport the player
    pub player_x: Option<f32>,
    /// Kill the actor a target string resolves to
    pub kill: Option<String>,
    #[serde(default)]
    pub kill_all_enemies: bool,
    #[serde(default)]
    pub advance_dialogue: bool,
    /// Start a sequence by id
    pub trigger: Option<String>,
}

/// Expected scenario outcomes
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioExpectations {
    /// Frames to run when nothing else asks for more
    pub max_frames: Option<u64>,
    #[serde(default)]
    pub sequence: Vec<ExpectedEvent>,
    /// State assertions at different frames (uses [[expect.state]] TOML syntax)
    #[serde(default)]
    pub state: Vec<StateAssertion>,
}

/// Expected event in sequence
#[derive(Debug, Deserialize)]
pub struct ExpectedEvent {
    /// Event type code (`SS`, `AV`, `SC`, ...)
    pub event: String,
    pub sequence: Option<String>,
    pub frame_min: Option<u64>,
    pub frame_max: Option<u64>,
}

/// State assertion after a frame
#[derive(Debug, Clone, Deserialize)]
pub struct StateAssertion {
    pub after_frame: u64,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Parse a scenario file from path
pub fn parse_scenario_file(path: &Path) -> Result<ScenarioDefinition, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let toml = r#"
name = "Test"
[setup]
level = "gate"
player_x = 80.0

[[setup.actors]]
kind = "enemy"
template = "thug"
x = 500.0
id = "guard"

[[step]]
frame = 0
walk_speed = 220.0

[[step]]
frame = 90
kill = "guard"

[expect]
[[expect.sequence]]
event = "SS"
sequence = "gate_intro"
"#;
        let def: ScenarioDefinition = toml::from_str(toml).unwrap();
        assert_eq!(def.name, "Test");
        assert_eq!(def.setup.level, "gate");
        assert_eq!(def.setup.actors[0].kind, ActorKind::Enemy);
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[1].kill.as_deref(), Some("guard"));
        assert_eq!(def.expect.sequence[0].event, "SS");
    }

    #[test]
    fn test_defaults() {
        let def: ScenarioDefinition = toml::from_str(
            r#"
name = "Bare"
[setup]
level = "empty"
"#,
        )
        .unwrap();
        assert_eq!(def.setup.player_x, PLAYER_START_X);
        assert!(def.steps.is_empty());
        assert!(def.expect.sequence.is_empty());
    }
}
