/// Master bus recorder - captures the mixed output and encodes it to WAV
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::recording::{Blob, Recorder};
use crate::{Error, Result};

pub const WAV_MIME: &str = "audio/wav";
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// The point on the master bus the recorder listens to
#[derive(Debug)]
pub struct BusTap {
    capturing: bool,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Default for BusTap {
    fn default() -> Self {
        Self {
            capturing: false,
            samples: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl BusTap {
    pub fn push(&mut self, sample: f32) {
        if self.capturing {
            self.samples.push(sample);
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

pub type SharedBusTap = Arc<Mutex<BusTap>>;

pub struct MasterBusRecorder {
    tap: SharedBusTap,
}

impl MasterBusRecorder {
    pub fn new(tap: SharedBusTap) -> Self {
        Self { tap }
    }

    fn lock(&self) -> MutexGuard<'_, BusTap> {
        self.tap.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Recorder for MasterBusRecorder {
    fn start(&mut self) {
        let mut tap = self.lock();
        tap.samples.clear();
        // A minute of mono audio up front keeps the callback from reallocating early on
        let reserve = tap.sample_rate as usize * 60;
        tap.samples.reserve(reserve);
        tap.capturing = true;
    }

    fn stop(&mut self) -> Result<Blob> {
        let (samples, sample_rate) = {
            let mut tap = self.lock();
            if !tap.capturing {
                return Err(Error::NotRecording);
            }
            tap.capturing = false;
            (std::mem::take(&mut tap.samples), tap.sample_rate)
        };
        encode_wav(&samples, sample_rate)
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Blob> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(Blob::new(cursor.into_inner(), WAV_MIME))
}

/// Decode a WAV blob back to mono-or-interleaved f32 samples.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, WavSpec)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / (1i64 << (spec.bits_per_sample - 1)) as f32))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    Ok((samples, spec))
}
