/// One monophonic triangle voice with an attack/decay/sustain/release envelope

const ATTACK_SECS: f32 = 0.005;
const DECAY_SECS: f32 = 0.1;
const SUSTAIN_LEVEL: f32 = 0.3;
const RELEASE_SECS: f32 = 1.0;
const VOICE_GAIN: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
pub struct Voice {
    sample_rate: f32,
    phase: f32,
    phase_inc: f32,
    level: f32,
    stage: Stage,
    release_frame: u64,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
            phase_inc: 0.0,
            level: 0.0,
            stage: Stage::Idle,
            release_frame: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Start a note now; its release begins at `release_frame`.
    /// Retriggering keeps the current level so there is no click.
    pub fn note_on(&mut self, frequency: f32, release_frame: u64) {
        self.phase_inc = frequency / self.sample_rate;
        self.release_frame = release_frame;
        self.stage = Stage::Attack;
    }

    pub fn next_sample(&mut self, frame: u64) -> f32 {
        if self.stage == Stage::Idle {
            return 0.0;
        }
        if frame >= self.release_frame && self.stage != Stage::Release {
            self.stage = Stage::Release;
        }
        self.advance_envelope();

        let sample = if self.phase < 0.5 {
            (self.phase * 4.0) - 1.0
        } else {
            3.0 - (self.phase * 4.0)
        };

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample * self.level * VOICE_GAIN
    }

    fn advance_envelope(&mut self) {
        let rate = self.sample_rate;
        let per_sample = |secs: f32| 1.0 / (secs * rate);

        match self.stage {
            Stage::Idle | Stage::Sustain => {}
            Stage::Attack => {
                self.level += per_sample(ATTACK_SECS);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - SUSTAIN_LEVEL) * per_sample(DECAY_SECS);
                if self.level <= SUSTAIN_LEVEL {
                    self.level = SUSTAIN_LEVEL;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Release => {
                self.level -= per_sample(RELEASE_SECS);
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.phase = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    #[test]
    fn test_idle_voice_is_silent() {
        let mut voice = Voice::new(RATE);
        assert!(!voice.is_active());
        assert_eq!(voice.next_sample(0), 0.0);
    }

    #[test]
    fn test_note_sounds_then_dies_out() {
        let mut voice = Voice::new(RATE);
        voice.note_on(440.0, 4_800);

        let peak = (0..4_800u64)
            .map(|frame| voice.next_sample(frame).abs())
            .fold(0.0f32, f32::max);
        assert!(peak > 0.05);

        let tail_end = 4_800 + (RATE * (RELEASE_SECS + 0.1)) as u64;
        for frame in 4_800..tail_end {
            voice.next_sample(frame);
        }
        assert!(!voice.is_active());
    }

    #[test]
    fn test_output_stays_within_gain() {
        let mut voice = Voice::new(RATE);
        voice.note_on(1_000.0, 10_000);
        for frame in 0..10_000u64 {
            assert!(voice.next_sample(frame).abs() <= VOICE_GAIN + 1e-6);
        }
    }
}
