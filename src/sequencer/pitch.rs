/// Pitch utility - MIDI note numbers, names and frequencies
const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch(pub u8);

impl Pitch {
    pub const C4: Pitch = Pitch(60);

    /// Shift by `semitones`, saturating at the MIDI range.
    pub fn transpose(self, semitones: i32) -> Pitch {
        let shifted = (self.0 as i32 + semitones).clamp(0, 127);
        Pitch(shifted as u8)
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((self.0 as f32 - 69.0) / 12.0)
    }

    pub fn name(self) -> String {
        let octave = (self.0 / 12) as i32 - 1;
        let note_index = (self.0 % 12) as usize;
        format!("{}{}", NOTE_NAMES[note_index], octave)
    }
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Pitch::C4.name(), "C4");
        assert_eq!(Pitch(61).name(), "C#4");
        assert_eq!(Pitch(71).name(), "B4");
        assert_eq!(Pitch(0).name(), "C-1");
    }

    #[test]
    fn test_transpose_crosses_octaves() {
        assert_eq!(Pitch(71).transpose(1).name(), "C5");
        assert_eq!(Pitch::C4.transpose(-12).name(), "C3");
        assert_eq!(Pitch(64).transpose(0), Pitch(64));
    }

    #[test]
    fn test_transpose_saturates() {
        assert_eq!(Pitch(120).transpose(12), Pitch(127));
        assert_eq!(Pitch(3).transpose(-12), Pitch(0));
    }

    #[test]
    fn test_frequency() {
        assert!((Pitch(69).frequency() - 440.0).abs() < 1e-3);
        assert!((Pitch(81).frequency() - 880.0).abs() < 1e-2);
    }
}
