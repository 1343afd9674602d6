//! Headless walk-through - plays a level's sequences without rendering
//!
//! The player walks right at a steady pace, swings at whatever enemy is in
//! reach, and dialogue lines advance on a timer. Every sequence event is
//! printed in the compact log format.
//!
//! Usage:
//!   cargo run --bin simulate -- --help
//!   cargo run --bin simulate -- --level demo --seconds 90
//!   cargo run --bin simulate -- --level demo --seed 7 --quiet

use bevy::prelude::*;

use brawler_events::constants::*;
use brawler_events::events::serialize_event;
use brawler_events::sequence::{RunOutcome, SequenceDatabase, SequenceDirector};
use brawler_events::settings::SequencerSettings;
use brawler_events::stage::Stage;

const FRAME_MS: f32 = 1000.0 / 60.0;
const ATTACK_RANGE: f32 = 80.0;
const ATTACK_DPS: f32 = 45.0;
const AUTO_ADVANCE_MS: f32 = 1_200.0;

struct SimArgs {
    level: String,
    seconds: f32,
    seed: Option<u64>,
    quiet: bool,
}

impl SimArgs {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut sim = Self {
            level: DEFAULT_LEVEL.to_string(),
            seconds: 120.0,
            seed: None,
            quiet: false,
        };
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--level" if i + 1 < args.len() => {
                    sim.level = args[i + 1].clone();
                    i += 1;
                }
                "--seconds" if i + 1 < args.len() => {
                    sim.seconds = args[i + 1].parse().unwrap_or(sim.seconds);
                    i += 1;
                }
                "--seed" if i + 1 < args.len() => {
                    sim.seed = args[i + 1].parse().ok();
                    i += 1;
                }
                "--quiet" | "-q" => sim.quiet = true,
                "--help" | "-h" => {
                    println!("simulate [--level NAME] [--seconds N] [--seed N] [--quiet]");
                    std::process::exit(0);
                }
                other => eprintln!("Ignoring unknown argument '{}'", other),
            }
            i += 1;
        }
        sim
    }
}

/// Hit the nearest enemy or boss in reach
fn swing(stage: &mut Stage, dt: f32) {
    let Some(player_x) = stage.player_x() else {
        return;
    };
    let target = stage
        .registry
        .combatant_ids()
        .into_iter()
        .filter_map(|id| stage.registry.get(id).map(|a| (id, (a.position.x - player_x).abs())))
        .filter(|(_, distance)| *distance <= ATTACK_RANGE)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((id, _)) = target {
        stage.damage(id, ATTACK_DPS * dt);
    }
}

fn main() {
    let args = SimArgs::from_args();

    let mut settings = SequencerSettings::load();
    settings.seed = args.seed.or(settings.seed);
    settings.dialogue_auto_advance_ms = settings.dialogue_auto_advance_ms.or(Some(AUTO_ADVANCE_MS));

    let mut level = args.level.clone();
    let mut database = SequenceDatabase::load_level(&level);
    let mut director = SequenceDirector::new(settings);
    director.register_sequences(database.sequences.clone());

    let mut stage = Stage::default();
    stage.spawn_player(Vec2::new(PLAYER_START_X, GROUND_Y));

    println!("Simulating level '{}' ({} sequences)", level, database.len());

    let frames = (args.seconds * 1000.0 / FRAME_MS) as u64;
    let mut completed = 0;
    let mut abandoned = 0;
    let mut last_seen_run = None;

    for _ in 0..frames {
        let dt = FRAME_MS / 1000.0;
        if stage.input_enabled
            && let Some(player) = stage.registry.player_mut()
        {
            player.velocity.x = PLAYER_WALK_SPEED;
            player.facing = 1.0;
        }
        if stage.input_enabled {
            swing(&mut stage, dt);
        }

        director.update(&mut stage, FRAME_MS);
        stage.reap_defeated();

        for entry in director.events.drain() {
            if !args.quiet {
                println!("{}", serialize_event(entry.time_ms, &entry.event));
            }
        }
        for cue in stage.take_sound_cues() {
            if !args.quiet {
                println!("  sound: {} ({:.2})", cue.key, cue.volume);
            }
        }

        if let Some(summary) = director.last_run()
            && last_seen_run != Some(summary.run)
        {
            last_seen_run = Some(summary.run);
            match summary.outcome {
                RunOutcome::Completed => completed += 1,
                RunOutcome::Abandoned(_) | RunOutcome::Cleared => abandoned += 1,
                RunOutcome::Chained(_) => {}
            }
        }

        if let Some(next) = stage.pending_level.take() {
            println!("Level change: '{}' -> '{}'", level, next);
            director.clear(&mut stage);
            stage.reset();
            database = SequenceDatabase::load_level(&next);
            director.register_sequences(database.sequences.clone());
            stage.spawn_player(Vec2::new(PLAYER_START_X, GROUND_Y));
            level = next;
        }

        if stage.player_x().is_some_and(|x| x >= stage.world.right() - PLAYER_SIZE.x) && !director.is_active() {
            break;
        }
    }

    println!("\n==============");
    println!("Level:       {}", level);
    println!("Elapsed:     {:.1}s", stage.elapsed_ms / 1000.0);
    println!("Player x:    {:.0}", stage.player_x().unwrap_or(0.0));
    println!("Completed:   {}", completed);
    println!("Abandoned:   {}", abandoned);
    println!(
        "Fired:       {}/{}",
        director.sequences().iter().filter(|s| director.has_fired(&s.id)).count(),
        director.sequences().len()
    );
}
