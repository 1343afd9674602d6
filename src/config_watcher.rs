//! Sequence file auto-reload system
//!
//! Polls the sequencer settings and the current level's sequence file every
//! few seconds and reloads whichever changed. Sequence definitions are only
//! swapped while the director is idle; a change seen mid-sequence waits for
//! the next check after it finishes.

use bevy::prelude::*;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::constants::SEQUENCER_SETTINGS_FILE;
use crate::sequence::{SequenceDatabase, SequenceDirector};
use crate::settings::SequencerSettings;

/// How often to check for file changes (seconds)
const CHECK_INTERVAL: f32 = 3.0;

/// Tracks modification times of sequencer files for hot-reload
#[derive(Resource, Debug)]
pub struct SequenceFileWatcher {
    /// Time since last check
    pub timer: f32,
    pub settings_mtime: Option<SystemTime>,
    pub sequences_mtime: Option<SystemTime>,
    /// Sequence file changed while a sequence was running
    pub reload_pending: bool,
}

impl SequenceFileWatcher {
    pub fn new(database: &SequenceDatabase) -> Self {
        Self {
            timer: 0.0,
            settings_mtime: get_mtime(Path::new(SEQUENCER_SETTINGS_FILE)),
            sequences_mtime: database.source.as_deref().and_then(get_mtime),
            reload_pending: false,
        }
    }

    /// Start watching a freshly loaded level
    pub fn watch_level(&mut self, database: &SequenceDatabase) {
        self.sequences_mtime = database.source.as_deref().and_then(get_mtime);
        self.reload_pending = false;
    }
}

/// Get file modification time, or None if file doesn't exist
fn get_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// Check for sequencer file changes and reload as needed
pub fn check_sequence_file_changes(
    time: Res<Time>,
    mut watcher: ResMut<SequenceFileWatcher>,
    mut director: ResMut<SequenceDirector>,
    mut database: ResMut<SequenceDatabase>,
    mut settings: ResMut<SequencerSettings>,
) {
    watcher.timer += time.delta_secs();
    if watcher.timer < CHECK_INTERVAL {
        return;
    }
    watcher.timer = 0.0;

    let new_settings_mtime = get_mtime(Path::new(SEQUENCER_SETTINGS_FILE));
    if new_settings_mtime != watcher.settings_mtime {
        watcher.settings_mtime = new_settings_mtime;
        *settings = SequencerSettings::load();
        director.apply_settings(settings.clone());
        info!("Auto-reloaded sequencer settings from {}", SEQUENCER_SETTINGS_FILE);
    }

    let new_sequences_mtime = database.source.as_deref().and_then(get_mtime);
    if new_sequences_mtime != watcher.sequences_mtime {
        watcher.sequences_mtime = new_sequences_mtime;
        watcher.reload_pending = true;
    }

    if !watcher.reload_pending {
        return;
    }
    if director.is_active() {
        debug!("Sequence file changed mid-sequence, reload deferred");
        return;
    }
    watcher.reload_pending = false;
    if database.reload() {
        director.reload_sequences(database.sequences.clone());
        info!(
            "Auto-reloaded {} sequences for level '{}'",
            database.len(),
            database.level
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_have_no_mtime() {
        let database = SequenceDatabase::load_level_from("does/not/exist", "nowhere");
        let watcher = SequenceFileWatcher::new(&database);
        assert!(watcher.sequences_mtime.is_none());
        assert!(!watcher.reload_pending);
    }

    #[test]
    fn test_bundled_level_is_watched() {
        let database = SequenceDatabase::load_level(crate::constants::DEFAULT_LEVEL);
        let mut watcher = SequenceFileWatcher::new(&database);
        assert!(watcher.sequences_mtime.is_some());
        watcher.reload_pending = true;
        watcher.watch_level(&database);
        assert!(!watcher.reload_pending);
    }
}
