/// Transport clock contract - run state, tempo and tick subdivision
use std::time::Duration;

use super::sanitize_bpm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    Started,
    Paused,
    #[default]
    Stopped,
}

impl TransportState {
    pub fn is_started(&self) -> bool {
        matches!(self, TransportState::Started)
    }
}

/// Musical note value the clock ticks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subdivision {
    Quarter,
    Eighth,
    Sixteenth,
}

impl Subdivision {
    pub fn per_beat(self) -> f64 {
        match self {
            Subdivision::Quarter => 1.0,
            Subdivision::Eighth => 2.0,
            Subdivision::Sixteenth => 4.0,
        }
    }

    /// Length of one subdivision at `bpm`. Unusable tempos count as 120.
    pub fn duration(self, bpm: f32) -> Duration {
        let beats_per_second = sanitize_bpm(bpm) as f64 / 60.0;
        Duration::from_secs_f64(1.0 / (beats_per_second * self.per_beat()))
    }
}

/// A periodic scheduler delivering ticks at a fixed subdivision.
///
/// Implementations deliver ticks out of band (see `PlaybackEngine::poll_events`);
/// the owner hands each tick's timestamp to `Session::on_tick`.
pub trait TransportClock {
    fn state(&self) -> TransportState;
    fn start(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn bpm(&self) -> f32;
    fn set_bpm(&mut self, bpm: f32);
    fn subdivision(&self) -> Subdivision {
        Subdivision::Eighth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eighth_note_at_120() {
        assert_eq!(Subdivision::Eighth.duration(120.0), Duration::from_millis(250));
    }

    #[test]
    fn test_subdivision_scales_with_tempo() {
        assert_eq!(Subdivision::Quarter.duration(60.0), Duration::from_secs(1));
        assert_eq!(Subdivision::Sixteenth.duration(60.0), Duration::from_millis(250));
        assert!(Subdivision::Eighth.duration(240.0) < Subdivision::Eighth.duration(40.0));
    }

    #[test]
    fn test_unusable_tempo_does_not_panic() {
        let fallback = Subdivision::Eighth.duration(120.0);
        assert_eq!(Subdivision::Eighth.duration(f32::NAN), fallback);
        assert_eq!(Subdivision::Eighth.duration(0.0), fallback);
        assert_eq!(Subdivision::Eighth.duration(f32::NEG_INFINITY), fallback);
    }

    #[test]
    fn test_default_state_is_stopped() {
        assert_eq!(TransportState::default(), TransportState::Stopped);
        assert!(!TransportState::Paused.is_started());
    }
}
