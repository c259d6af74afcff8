/// Runtime configuration read from the environment
use std::env;
use std::path::PathBuf;

use crate::sequencer::{parse_bpm, parse_transpose, DEFAULT_BPM};

pub const EXPORT_DIR_VAR: &str = "TONICTWO_EXPORT_DIR";
pub const BPM_VAR: &str = "TONICTWO_BPM";
pub const TRANSPOSE_VAR: &str = "TONICTWO_TRANSPOSE";
pub const MIDI_PORT_VAR: &str = "TONICTWO_MIDI_PORT";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory downloads are written to
    pub export_dir: PathBuf,
    pub bpm: f32,
    pub transpose: i32,
    /// MIDI output port to mirror voices to, if any
    pub midi_port: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("."),
            bpm: DEFAULT_BPM,
            transpose: 0,
            midi_port: None,
        }
    }
}

impl Config {
    /// Build from the process environment; the first CLI argument overrides the export dir.
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| env::var(key).ok());
        if let Some(dir) = env::args().nth(1) {
            config.export_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            export_dir: lookup(EXPORT_DIR_VAR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            bpm: lookup(BPM_VAR).map_or(defaults.bpm, |v| parse_bpm(&v)),
            transpose: lookup(TRANSPOSE_VAR).map_or(defaults.transpose, |v| parse_transpose(&v)),
            midi_port: lookup(MIDI_PORT_VAR).and_then(|v| v.trim().parse().ok()),
        }
    }
}
