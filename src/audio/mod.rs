/// Audio output using cpal - the synth pool and master bus
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub mod recorder;
pub mod voice;

use crate::recording::Blob;
use crate::sequencer::pitch::Pitch;
use crate::sequencer::{SynthPool, ROWS};
use crate::{Error, Result};
use recorder::{BusTap, MasterBusRecorder, SharedBusTap};
use voice::Voice;

const MASTER_GAIN: f32 = 1.0;

#[derive(Debug, Clone, Copy)]
struct ScheduledNote {
    voice: usize,
    frequency: f32,
    start_frame: u64,
    release_frame: u64,
}

struct Preview {
    samples: Vec<f32>,
    channels: usize,
    position: usize,
}

/// Everything the audio callback touches
pub(crate) struct SynthState {
    sample_rate: f32,
    channels: usize,
    epoch: Option<Instant>,
    frame: u64,
    voices: [Voice; ROWS],
    pending: Vec<ScheduledNote>,
    preview: Option<Preview>,
}

impl SynthState {
    fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            epoch: None,
            frame: 0,
            voices: [Voice::new(sample_rate); ROWS],
            pending: Vec::with_capacity(ROWS * 4),
            preview: None,
        }
    }

    /// Frame index corresponding to `at`; instants before the epoch map to frame 0.
    fn frame_at(&self, at: Instant) -> u64 {
        self.epoch
            .and_then(|epoch| at.checked_duration_since(epoch))
            .map_or(0, |offset| (offset.as_secs_f64() * self.sample_rate as f64) as u64)
    }

    fn schedule(&mut self, voice: usize, frequency: f32, duration: Duration, at: Instant) {
        let start_frame = self.frame_at(at);
        let length = (duration.as_secs_f64() * self.sample_rate as f64) as u64;
        self.pending.push(ScheduledNote {
            voice,
            frequency,
            start_frame,
            release_frame: start_frame + length,
        });
    }

    fn start_due_notes(&mut self) {
        let Self {
            pending,
            voices,
            frame,
            ..
        } = self;

        pending.retain(|note| {
            if note.start_frame > *frame {
                return true;
            }
            if let Some(voice) = voices.get_mut(note.voice) {
                voice.note_on(note.frequency, note.release_frame.max(*frame));
            }
            false
        });
    }

    fn next_preview_sample(&self, channel: usize) -> f32 {
        let Some(preview) = self.preview.as_ref() else {
            return 0.0;
        };
        let source_channel = channel.min(preview.channels - 1);
        preview
            .samples
            .get(preview.position + source_channel)
            .copied()
            .unwrap_or(0.0)
    }

    fn advance_preview(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            preview.position += preview.channels;
            if preview.position >= preview.samples.len() {
                self.preview = None;
            }
        }
    }

    /// Fill an interleaved output buffer. The master bus mix goes to `bus`;
    /// the preview player is added after the tap.
    pub(crate) fn render(&mut self, data: &mut [f32], bus: &mut BusTap) {
        let channels = self.channels;
        for frame in data.chunks_mut(channels) {
            self.start_due_notes();

            let current = self.frame;
            let mix: f32 = self.voices.iter_mut().map(|v| v.next_sample(current)).sum();
            let master = mix * MASTER_GAIN;
            bus.push(master);

            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = master + self.next_preview_sample(channel);
            }
            self.advance_preview();
            self.frame += 1;
        }
    }
}

pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    state: Arc<Mutex<SynthState>>,
    bus: SharedBusTap,
}

impl AudioOutput {
    /// Create the synth pool. No device is opened until `unlock`.
    pub fn new() -> Self {
        Self {
            stream: None,
            state: Arc::new(Mutex::new(SynthState::new(
                recorder::DEFAULT_SAMPLE_RATE as f32,
                2,
            ))),
            bus: SharedBusTap::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SynthState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_unlocked(&self) -> bool {
        self.stream.is_some()
    }

    /// A recorder listening to this output's master bus
    pub fn recorder(&self) -> MasterBusRecorder {
        MasterBusRecorder::new(Arc::clone(&self.bus))
    }

    /// Play an exported WAV blob through the output, outside the master bus.
    pub fn preview(&mut self, blob: &Blob) -> Result<()> {
        let (samples, spec) = recorder::decode_wav(&blob.bytes)?;
        self.unlock()?;
        self.lock().preview = Some(Preview {
            samples,
            channels: spec.channels.max(1) as usize,
            position: 0,
        });
        Ok(())
    }

    fn setup_audio_stream(
        state: Arc<Mutex<SynthState>>,
        bus: SharedBusTap,
    ) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;

        let sample_format = config.sample_format();
        if sample_format != cpal::SampleFormat::F32 {
            return Err(Error::UnsupportedSampleFormat(format!("{sample_format:?}")));
        }

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        {
            let mut synth = state.lock().unwrap_or_else(|e| e.into_inner());
            *synth = SynthState::new(sample_rate as f32, channels);
            synth.epoch = Some(Instant::now());
        }
        bus.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_sample_rate(sample_rate);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut synth = state.lock().unwrap_or_else(|e| e.into_inner());
                    let mut tap = bus.lock().unwrap_or_else(|e| e.into_inner());
                    synth.render(data, &mut tap);
                },
                |err| tracing::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(sample_rate, channels, "audio output unlocked");
        Ok(stream)
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthPool for AudioOutput {
    fn unlock(&mut self) -> Result<()> {
        if self.stream.is_none() {
            let stream = Self::setup_audio_stream(Arc::clone(&self.state), Arc::clone(&self.bus))?;
            self.stream = Some(stream);
        }
        Ok(())
    }

    fn trigger_attack_release(&mut self, voice: usize, pitch: Pitch, duration: Duration, at: Instant) {
        if !self.is_unlocked() {
            tracing::trace!(voice, %pitch, "output locked, note dropped");
            return;
        }
        self.lock().schedule(voice, pitch.frequency(), duration, at);
    }
}
