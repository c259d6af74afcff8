/// TonicTwo - a 7-note by 8-step sequencer
///
/// This library provides the pieces of the sequencer:
/// - Pattern grid, step engine and transpose
/// - A threaded transport clock emitting timestamped ticks
/// - Audio output (cpal synth pool + master bus recorder)
/// - MIDI output mirroring each row on its own channel
/// - Recording sessions that export the master bus as a download

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod recording;
pub mod sequencer;
pub mod session;

// Re-export commonly used types
pub use audio::recorder::MasterBusRecorder;
pub use audio::AudioOutput;
pub use config::Config;
pub use error::{Error, Result};
pub use midi::MidiOutputDevice;
pub use recording::{save_download, Blob, Download, ObjectUrl, Recorder, RecordingSession};
pub use sequencer::pitch::Pitch;
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent};
pub use sequencer::transport::{Subdivision, TransportClock, TransportState};
pub use sequencer::{Grid, Sequencer, SynthPool};
pub use session::Session;
