use serde::{Deserialize, Serialize};

/// MIDI note number of the first pitch class (middle C).
pub const BASE_NOTE: u8 = 60;

/// One of the twelve pitch classes, spelled with flats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Db,
    D,
    Eb,
    E,
    F,
    Gb,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Db,
        PitchClass::D,
        PitchClass::Eb,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Gb,
        PitchClass::G,
        PitchClass::Ab,
        PitchClass::A,
        PitchClass::Bb,
        PitchClass::B,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Db => "Db",
            PitchClass::D => "D",
            PitchClass::Eb => "Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Gb => "Gb",
            PitchClass::G => "G",
            PitchClass::Ab => "Ab",
            PitchClass::A => "A",
            PitchClass::Bb => "Bb",
            PitchClass::B => "B",
        }
    }

    /// Name with a proper flat sign, for display on the lattice.
    pub fn display_name(&self) -> String {
        self.name().replace('b', "♭")
    }

    /// Semitones above C (0..=11)
    pub fn semitone(&self) -> u8 {
        *self as u8
    }

    /// MIDI note number in the base octave (60..=71).
    pub fn to_midi(self) -> u8 {
        BASE_NOTE + self.semitone()
    }

    /// Total mapping from any integer note number to its pitch class.
    pub fn from_midi(note: i32) -> PitchClass {
        Self::ALL[note.rem_euclid(12) as usize]
    }

    /// Transpose by a signed number of semitones, wrapping within the octave.
    pub fn transpose(self, semitones: i32) -> PitchClass {
        Self::from_midi(self.semitone() as i32 + semitones)
    }

    /// Parse "Bb", "B♭" or a sharp spelling such as "A#".
    pub fn parse(s: &str) -> Option<PitchClass> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let offset = match chars.as_str() {
            "" => 0,
            "b" | "♭" => -1,
            "#" | "♯" => 1,
            _ => return None,
        };
        Some(Self::from_midi(natural + offset))
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
