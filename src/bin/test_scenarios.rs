//! Scenario test runner CLI
//!
//! Usage:
//!   cargo run --bin test-scenarios              # Run all scenarios
//!   cargo run --bin test-scenarios -- triggers/ # Run category
//!   cargo run --bin test-scenarios -- dialogue/intro_pause  # Run one
//!   cargo run --bin test-scenarios -- --verbose # Show details on failure

use std::env;
use std::path::Path;

use brawler_events::testing::{
    SCENARIOS_DIR, TestResult, discover_scenarios, parse_scenario_file, run_test,
};

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut verbose = false;
    let mut filter: Option<String> = None;

    for arg in &args[1..] {
        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if !arg.starts_with('-') {
            filter = Some(arg.clone());
        }
    }

    println!("Sequence Scenarios");
    println!("==================\n");

    let scenarios_path = Path::new(SCENARIOS_DIR);
    if !scenarios_path.exists() {
        println!("No scenarios directory found at {}", SCENARIOS_DIR);
        std::process::exit(1);
    }

    let tests: Vec<_> = discover_scenarios(scenarios_path)
        .into_iter()
        .filter(|path| {
            filter.as_deref().is_none_or(|f| {
                path.strip_prefix(scenarios_path)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .contains(f)
            })
        })
        .collect();

    if tests.is_empty() {
        println!("No scenario files found.");
        if let Some(f) = filter {
            println!("Filter: {}", f);
        }
        std::process::exit(1);
    }

    let mut passed = 0;
    let mut failed = 0;
    let mut errors = 0;
    let mut current_category = String::new();

    for test_path in &tests {
        let rel_path = test_path.strip_prefix(scenarios_path).unwrap_or(test_path);

        // Print category header
        if let Some(parent) = rel_path.parent() {
            let category = parent.to_string_lossy().to_string();
            if category != current_category && !category.is_empty() {
                if !current_category.is_empty() {
                    println!();
                }
                println!("{}/", category);
                current_category = category;
            }
        }

        let test_name = rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let scenario = match parse_scenario_file(test_path) {
            Ok(def) => def,
            Err(e) => {
                print_result(&test_name, &TestResult::Error { message: e }, verbose);
                errors += 1;
                continue;
            }
        };

        let result = run_test(&scenario);

        match &result {
            TestResult::Pass { .. } => passed += 1,
            TestResult::Fail { .. } => failed += 1,
            TestResult::Error { .. } => errors += 1,
        }

        print_result(&test_name, &result, verbose);
        if verbose && let Some(description) = &scenario.description {
            println!("    {}", description);
        }
    }

    println!("\n==================");
    println!(
        "Results: {} passed, {} failed, {} errors",
        passed, failed, errors
    );

    if failed > 0 || errors > 0 {
        std::process::exit(1);
    }
}

fn print_result(name: &str, result: &TestResult, verbose: bool) {
    let dots = ".".repeat(40 - name.len().min(39));

    match result {
        TestResult::Pass { frames } => {
            println!("  {} {} PASS ({} frames)", name, dots, frames);
        }
        TestResult::Fail { error } => {
            println!("  {} {} FAIL", name, dots);
            if verbose {
                println!("    {}", error);
            } else {
                println!("    {}", error.message);
            }
        }
        TestResult::Error { message } => {
            println!("  {} {} ERROR", name, dots);
            println!("    {}", message);
        }
    }
}
