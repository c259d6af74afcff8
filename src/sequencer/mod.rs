/// Core sequencer logic - pattern grid, step cursor and transpose
use std::time::{Duration, Instant};

pub mod pitch;
pub mod playback;
pub mod transport;

use pitch::Pitch;
use transport::TransportClock;

pub const ROWS: usize = 7;
pub const STEPS: usize = 8;

/// Base pitch of each row, top to bottom: C4 D4 E4 F4 G4 A4 B4
pub const NOTE_ROWS: [Pitch; ROWS] = [
    Pitch(60),
    Pitch(62),
    Pitch(64),
    Pitch(65),
    Pitch(67),
    Pitch(69),
    Pitch(71),
];

pub const DEFAULT_BPM: f32 = 120.0;
pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 240.0;
pub const MAX_TRANSPOSE: i32 = 12;

/// Clamp a tempo into [40, 240]. NaN, infinite and non-positive tempos give 120.
pub fn sanitize_bpm(bpm: f32) -> f32 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        DEFAULT_BPM
    }
}

/// Parse a BPM control value. Empty or unparsable input gives 120.
pub fn parse_bpm(input: &str) -> f32 {
    input.trim().parse::<f32>().map_or(DEFAULT_BPM, sanitize_bpm)
}

/// Parse a transpose control value in semitones. Empty or unparsable input gives 0.
pub fn parse_transpose(input: &str) -> i32 {
    match input.trim().parse::<f64>() {
        Ok(semis) if semis.is_finite() => clamp_transpose(semis.round() as i32),
        _ => 0,
    }
}

pub fn clamp_transpose(semitones: i32) -> i32 {
    semitones.clamp(-MAX_TRANSPOSE, MAX_TRANSPOSE)
}

/// Seven monophonic voices, one per note row.
pub trait SynthPool {
    /// Make the output device ready to play. Must be idempotent.
    fn unlock(&mut self) -> crate::Result<()>;

    fn voice_count(&self) -> usize {
        ROWS
    }

    /// Sound `pitch` on `voice` for `duration`, starting at `at`.
    fn trigger_attack_release(&mut self, voice: usize, pitch: Pitch, duration: Duration, at: Instant);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: [[bool; STEPS]; ROWS],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[false; STEPS]; ROWS],
        }
    }

    pub fn rows(&self) -> usize {
        ROWS
    }

    pub fn steps(&self) -> usize {
        STEPS
    }

    pub fn get(&self, row: usize, step: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|cells| cells.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, step: usize, value: bool) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|cells| cells.get_mut(step)) {
            *cell = value;
        }
    }

    pub fn toggle(&mut self, row: usize, step: usize) {
        let current = self.get(row, step);
        self.set(row, step, !current);
    }

    fn clear(&mut self) {
        self.cells = [[false; STEPS]; ROWS];
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| **cell).count()
    }
}

/// Step engine state: grid, unbounded step cursor and transpose offset.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    grid: Grid,
    cursor: u64,
    transpose: i32,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Step the next tick will play
    pub fn active_step(&self) -> usize {
        active_step(self.cursor)
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    pub fn set_transpose(&mut self, semitones: i32) {
        self.transpose = clamp_transpose(semitones);
    }

    /// Pitch row `row` sounds at under the current transpose
    pub fn sounding_pitch(&self, row: usize) -> Option<Pitch> {
        NOTE_ROWS.get(row).map(|base| base.transpose(self.transpose))
    }

    /// Play the current step at `at` and advance the cursor. Returns the step played.
    pub fn tick<S: SynthPool + ?Sized>(&mut self, at: Instant, note_length: Duration, synths: &mut S) -> usize {
        let step = self.active_step();
        let rows = self.grid.rows().min(synths.voice_count());

        for row in 0..rows {
            if !self.grid.get(row, step) {
                continue;
            }
            if let Some(pitch) = self.sounding_pitch(row) {
                synths.trigger_attack_release(row, pitch, note_length, at);
            }
        }

        self.cursor = self.cursor.wrapping_add(1);
        step
    }

    /// Wipe the grid, stop the transport and rewind to step 0.
    pub fn clear<C: TransportClock + ?Sized>(&mut self, clock: &mut C) {
        self.grid.clear();
        clock.stop();
        self.cursor = 0;
    }
}

pub fn active_step(cursor: u64) -> usize {
    (cursor % STEPS as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSynths {
        notes: Vec<(usize, Pitch, Duration, Instant)>,
        voices: Option<usize>,
    }

    impl SynthPool for RecordingSynths {
        fn unlock(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn voice_count(&self) -> usize {
            self.voices.unwrap_or(ROWS)
        }

        fn trigger_attack_release(&mut self, voice: usize, pitch: Pitch, duration: Duration, at: Instant) {
            self.notes.push((voice, pitch, duration, at));
        }
    }

    #[test]
    fn test_grid_starts_empty() {
        let grid = Grid::new();
        assert_eq!(grid.rows(), 7);
        assert_eq!(grid.steps(), 8);
        assert_eq!(grid.active_count(), 0);
    }

    #[test]
    fn test_grid_toggle() {
        let mut grid = Grid::new();
        grid.toggle(2, 5);
        assert!(grid.get(2, 5));
        grid.toggle(2, 5);
        assert!(!grid.get(2, 5));
    }

    #[test]
    fn test_grid_out_of_range_reads_false() {
        let mut grid = Grid::new();
        grid.set(7, 0, true);
        grid.set(0, 8, true);
        assert!(!grid.get(7, 0));
        assert!(!grid.get(0, 8));
        assert_eq!(grid.active_count(), 0);
    }

    #[test]
    fn test_active_step_wraps() {
        for i in 0..100u64 {
            assert_eq!(active_step(i), (i % 8) as usize);
        }
        assert_eq!(active_step(u64::MAX), (u64::MAX % 8) as usize);
    }

    #[test]
    fn test_tick_plays_only_current_step() {
        let mut seq = Sequencer::new();
        let mut synths = RecordingSynths::default();
        seq.grid_mut().set(0, 0, true);
        seq.grid_mut().set(4, 0, true);
        seq.grid_mut().set(1, 1, true);

        let at = Instant::now();
        let step = seq.tick(at, Duration::from_millis(250), &mut synths);

        assert_eq!(step, 0);
        assert_eq!(seq.cursor(), 1);
        let voices: Vec<usize> = synths.notes.iter().map(|n| n.0).collect();
        assert_eq!(voices, vec![0, 4]);
        assert_eq!(synths.notes[1].1, Pitch(67));
        assert_eq!(synths.notes[0].3, at);
    }

    #[test]
    fn test_tick_applies_transpose() {
        let mut seq = Sequencer::new();
        let mut synths = RecordingSynths::default();
        seq.grid_mut().set(6, 0, true);
        seq.set_transpose(3);

        seq.tick(Instant::now(), Duration::from_millis(250), &mut synths);

        assert_eq!(synths.notes.len(), 1);
        assert_eq!(synths.notes[0].1.name(), "D5");
    }

    #[test]
    fn test_tick_respects_voice_count() {
        let mut seq = Sequencer::new();
        let mut synths = RecordingSynths {
            voices: Some(3),
            ..Default::default()
        };
        for row in 0..ROWS {
            seq.grid_mut().set(row, 0, true);
        }

        seq.tick(Instant::now(), Duration::from_millis(250), &mut synths);

        assert_eq!(synths.notes.len(), 3);
    }

    #[test]
    fn test_transpose_is_clamped() {
        let mut seq = Sequencer::new();
        seq.set_transpose(13);
        assert_eq!(seq.transpose(), 12);
        seq.set_transpose(-13);
        assert_eq!(seq.transpose(), -12);
    }

    #[test]
    fn test_parse_bpm() {
        assert_eq!(parse_bpm("90"), 90.0);
        assert_eq!(parse_bpm(" 132.5 "), 132.5);
        assert_eq!(parse_bpm(""), DEFAULT_BPM);
        assert_eq!(parse_bpm("abc"), DEFAULT_BPM);
        assert_eq!(parse_bpm("0"), DEFAULT_BPM);
        assert_eq!(parse_bpm("1000"), MAX_BPM);
        assert_eq!(parse_bpm("10"), MIN_BPM);
    }

    #[test]
    fn test_sanitize_bpm_rejects_nan_and_zero() {
        assert_eq!(sanitize_bpm(f32::NAN), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(f32::INFINITY), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(0.0), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(-90.0), DEFAULT_BPM);
        assert_eq!(sanitize_bpm(96.0), 96.0);
        assert_eq!(parse_bpm("NaN"), DEFAULT_BPM);
        assert_eq!(parse_bpm("inf"), DEFAULT_BPM);
    }

    #[test]
    fn test_parse_transpose() {
        assert_eq!(parse_transpose("5"), 5);
        assert_eq!(parse_transpose("-7"), -7);
        assert_eq!(parse_transpose(""), 0);
        assert_eq!(parse_transpose("up"), 0);
        assert_eq!(parse_transpose("13"), 12);
        assert_eq!(parse_transpose("-13"), -12);
    }
}
