//! Sequence database - per-level sequence files
//!
//! `assets/sequences/<level>.json` holds a JSON array of sequence definitions.
//! A missing or unparsable file means the level simply has no sequences.

use bevy::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::definition::SequenceDefinition;
use crate::constants::*;

/// Sequences of the loaded level
#[derive(Resource, Debug, Default, Clone)]
pub struct SequenceDatabase {
    pub level: String,
    pub sequences: Vec<SequenceDefinition>,
    /// File the sequences came from (watched for hot reload)
    pub source: Option<PathBuf>,
}

impl SequenceDatabase {
    /// Path of a level's sequence file under `dir`
    pub fn level_path(dir: &str, level: &str) -> PathBuf {
        Path::new(dir).join(format!("{}.json", level))
    }

    /// Load a level's sequences from the default directory
    pub fn load_level(level: &str) -> Self {
        Self::load_level_from(SEQUENCES_DIR, level)
    }

    pub fn load_level_from(dir: &str, level: &str) -> Self {
        let path = Self::level_path(dir, level);
        let sequences = match Self::load_from_file(&path) {
            Ok(sequences) => {
                info!("Loaded {} sequences for level '{}'", sequences.len(), level);
                sequences
            }
            Err(e) => {
                warn!("{}, level '{}' has no sequences", e, level);
                Vec::new()
            }
        };
        Self {
            level: level.to_string(),
            sequences,
            source: Some(path),
        }
    }

    /// Read and parse one sequence file
    pub fn load_from_file(path: &Path) -> Result<Vec<SequenceDefinition>, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    /// Parse a JSON array of sequences
    pub fn parse(contents: &str) -> Result<Vec<SequenceDefinition>, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Re-read the source file. Keeps the old sequences if it no longer parses.
    pub fn reload(&mut self) -> bool {
        let Some(path) = self.source.clone() else {
            return false;
        };
        match Self::load_from_file(&path) {
            Ok(sequences) => {
                self.sequences = sequences;
                true
            }
            Err(e) => {
                warn!("{}, keeping previous sequences", e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
