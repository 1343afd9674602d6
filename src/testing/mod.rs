//! Scenario testing for scripted sequences
//!
//! TOML scenarios set up a stage, script the host's part frame by frame and
//! assert on the director's event log and the final state.

pub mod assertions;
pub mod parser;
pub mod runner;

use std::fs;
use std::path::{Path, PathBuf};

pub use assertions::{AssertionError, CapturedEvent, WorldState, check_sequence, check_state};
pub use parser::{
    ActorDef, ExpectedEvent, ScenarioDefinition, ScenarioExpectations, ScenarioSetup, ScenarioStep,
    StateAssertion, parse_scenario_file,
};
pub use runner::{FRAME_MS, TestResult, build_scenario, run_test};

/// Default path for scenarios
pub const SCENARIOS_DIR: &str = "tests/scenarios";

/// All `.toml` files under `dir`, recursively, sorted
pub fn discover_scenarios(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_scenarios(dir, &mut files);
    files.sort();
    files
}

fn collect_scenarios(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_scenarios(&path, files);
        } else if path.extension().is_some_and(|e| e == "toml") {
            files.push(path);
        }
    }
}
