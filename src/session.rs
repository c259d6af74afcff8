/// Session controller - owns all sequencer state and handles every UI event
use std::time::Instant;

use crate::config::Config;
use crate::recording::{Download, ObjectUrl, Recorder, RecordingSession};
use crate::sequencer::transport::{TransportClock, TransportState};
use crate::sequencer::{parse_bpm, parse_transpose, sanitize_bpm, Grid, Sequencer, SynthPool};
use crate::Result;

pub struct Session<C, S, R> {
    clock: C,
    synths: S,
    sequencer: Sequencer,
    recording: RecordingSession<R>,
}

impl<C, S, R> Session<C, S, R>
where
    C: TransportClock,
    S: SynthPool,
    R: Recorder,
{
    pub fn new(clock: C, synths: S, recorder: R) -> Self {
        Self {
            clock,
            synths,
            sequencer: Sequencer::new(),
            recording: RecordingSession::new(recorder),
        }
    }

    /// Apply the initial control values from `config`.
    pub fn configure(&mut self, config: &Config) {
        self.set_bpm(config.bpm);
        self.sequencer.set_transpose(config.transpose);
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn synths(&self) -> &S {
        &self.synths
    }

    pub fn synths_mut(&mut self) -> &mut S {
        &mut self.synths
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn grid(&self) -> &Grid {
        self.sequencer.grid()
    }

    pub fn recording(&self) -> &RecordingSession<R> {
        &self.recording
    }

    pub fn transport_state(&self) -> TransportState {
        self.clock.state()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    pub fn toggle_cell(&mut self, row: usize, step: usize) {
        self.sequencer.grid_mut().toggle(row, step);
    }

    pub fn set_cell(&mut self, row: usize, step: usize, value: bool) {
        self.sequencer.grid_mut().set(row, step, value);
    }

    /// Unlock audio, then pause a running transport or start a halted one.
    pub fn toggle_play(&mut self) -> Result<()> {
        self.synths.unlock()?;
        if self.clock.state().is_started() {
            self.clock.pause();
            tracing::info!(step = self.sequencer.active_step(), "paused");
        } else {
            self.clock.start();
            tracing::info!(step = self.sequencer.active_step(), "playing");
        }
        Ok(())
    }

    /// Wipe the grid, stop the transport and rewind, as one action.
    pub fn clear(&mut self) {
        self.sequencer.clear(&mut self.clock);
        tracing::info!("board cleared");
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.clock.set_bpm(sanitize_bpm(bpm));
    }

    /// Apply raw BPM control text. Returns the tempo in effect.
    pub fn set_bpm_input(&mut self, input: &str) -> f32 {
        let bpm = parse_bpm(input);
        self.clock.set_bpm(bpm);
        bpm
    }

    /// Apply raw transpose control text. Returns the offset in effect.
    pub fn set_transpose_input(&mut self, input: &str) -> i32 {
        self.sequencer.set_transpose(parse_transpose(input));
        self.sequencer.transpose()
    }

    pub fn transpose_label(&self) -> String {
        self.sequencer.transpose().to_string()
    }

    /// Handle one transport tick due at `at`. Returns the step played.
    pub fn on_tick(&mut self, at: Instant) -> usize {
        let note_length = self.clock.subdivision().duration(self.clock.bpm());
        self.sequencer.tick(at, note_length, &mut self.synths)
    }

    pub fn start_recording(&mut self) -> Result<()> {
        self.recording.start(&mut self.synths, &mut self.clock)
    }

    pub fn stop_recording(&mut self, track_name: &str, now: Instant) -> Result<Option<Download>> {
        self.recording.stop(track_name, now)
    }

    /// Release expired object URLs.
    pub fn sweep(&mut self, now: Instant) -> Vec<ObjectUrl> {
        self.recording.sweep(now)
    }
}
