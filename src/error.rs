/// Crate-wide error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("Recorder is not capturing")]
    NotRecording,

    #[error("Object URL has been revoked: {0}")]
    RevokedUrl(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
