use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("invalid note name '{0}'")]
    InvalidName(String),
    #[error("note '{0}' is outside the MIDI range")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Eb,
    E,
    F,
    Fs,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl PitchClass {
    pub const fn semitone(self) -> i16 {
        self as i16
    }
}

const NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// A MIDI note number in `0..=127`, written as `C4` (= 60) in score files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note(u8);

impl Note {
    pub const fn from_midi(midi: u8) -> Option<Self> {
        if midi <= 127 { Some(Note(midi)) } else { None }
    }

    /// Builds a note from a pitch class and octave, saturating at the edges
    /// of the MIDI range.
    pub const fn at(class: PitchClass, octave: i8) -> Self {
        let midi = (octave as i16 + 1) * 12 + class.semitone();
        let midi = if midi < 0 {
            0
        } else if midi > 127 {
            127
        } else {
            midi
        };
        Note(midi as u8)
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn freq(self) -> f32 {
        super::midi_to_freq(self.0)
    }

    pub fn transpose(self, semitones: i8) -> Option<Self> {
        let midi = self.0 as i16 + semitones as i16;
        if (0..=127).contains(&midi) {
            Some(Note(midi as u8))
        } else {
            None
        }
    }
}

impl FromStr for Note {
    type Err = NoteError;

    /// Accepts `C4`, `c4`, `Eb3`, `F#2`, `Fs2`, `C-1`. A missing octave
    /// means octave 4.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches(':');
        let mut chars = name.chars().peekable();

        let base: i16 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(NoteError::InvalidName(s.to_string())),
        };

        let mut accidental: i16 = 0;
        while let Some(&c) = chars.peek() {
            match c {
                '#' | 's' => accidental += 1,
                'b' => accidental -= 1,
                _ => break,
            }
            chars.next();
        }

        let rest: String = chars.collect();
        let octave: i16 = if rest.is_empty() {
            4
        } else {
            rest.parse()
                .map_err(|_| NoteError::InvalidName(s.to_string()))?
        };

        if !(-1..=9).contains(&octave) {
            return Err(NoteError::OutOfRange(s.to_string()));
        }
        let midi = (octave + 1) * 12 + base + accidental;
        if !(0..=127).contains(&midi) {
            return Err(NoteError::OutOfRange(s.to_string()));
        }
        Ok(Note(midi as u8))
    }
}

impl TryFrom<String> for Note {
    type Error = NoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = self.0 as i16 / 12 - 1;
        write!(f, "{}{}", NAMES[(self.0 % 12) as usize], octave)
    }
}

/// What a note event sounds: one note, or several struck together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pitch {
    Single(Note),
    Chord(Vec<Note>),
}

impl Pitch {
    pub fn notes(&self) -> &[Note] {
        match self {
            Pitch::Single(note) => std::slice::from_ref(note),
            Pitch::Chord(notes) => notes,
        }
    }
}

impl From<Note> for Pitch {
    fn from(note: Note) -> Self {
        Pitch::Single(note)
    }
}

impl From<Vec<Note>> for Pitch {
    fn from(notes: Vec<Note>) -> Self {
        Pitch::Chord(notes)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pitch::Single(note) => write!(f, "{note}"),
            Pitch::Chord(notes) => {
                write!(f, "[")?;
                for (i, note) in notes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{note}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Major7,
    Minor7,
    Dom7,
    Dim,
    Aug,
}

impl ChordQuality {
    pub fn intervals(self) -> &'static [i8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dom7 => &[0, 4, 7, 10],
            ChordQuality::Dim => &[0, 3, 6],
            ChordQuality::Aug => &[0, 4, 8],
        }
    }
}

/// Chord tones from `root` upwards. Tones that would leave the MIDI range
/// are dropped.
pub fn chord(root: Note, quality: ChordQuality) -> Vec<Note> {
    quality
        .intervals()
        .iter()
        .filter_map(|&interval| root.transpose(interval))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sonic_pi_names() {
        assert_eq!("C4".parse::<Note>().unwrap().midi(), 60);
        assert_eq!(":C4".parse::<Note>().unwrap().midi(), 60);
        assert_eq!("a4".parse::<Note>().unwrap().midi(), 69);
        assert_eq!("Eb3".parse::<Note>().unwrap().midi(), 51);
        assert_eq!("F#2".parse::<Note>().unwrap().midi(), 42);
        assert_eq!("Fs2".parse::<Note>().unwrap().midi(), 42);
        assert_eq!("C-1".parse::<Note>().unwrap().midi(), 0);
        assert_eq!("G".parse::<Note>().unwrap().midi(), 67);
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!("H4".parse::<Note>(), Err(NoteError::InvalidName(_))));
        assert!(matches!("C4x".parse::<Note>(), Err(NoteError::InvalidName(_))));
        assert!(matches!("".parse::<Note>(), Err(NoteError::InvalidName(_))));
        assert!(matches!("G#9".parse::<Note>(), Err(NoteError::OutOfRange(_))));
        assert_eq!("G9".parse::<Note>().unwrap().midi(), 127);
    }

    #[test]
    fn huge_octaves_are_out_of_range() {
        assert!(matches!("C3000".parse::<Note>(), Err(NoteError::OutOfRange(_))));
        assert!(matches!("C-3000".parse::<Note>(), Err(NoteError::OutOfRange(_))));
        assert!(matches!("Cb-1".parse::<Note>(), Err(NoteError::OutOfRange(_))));
        assert_eq!("C-1".parse::<Note>().unwrap().midi(), 0);
    }

    #[test]
    fn display_uses_readable_names() {
        assert_eq!(Note::at(PitchClass::C, 4).to_string(), "C4");
        assert_eq!(Note::at(PitchClass::Bb, 2).to_string(), "Bb2");
        assert_eq!(Note::from_midi(0).unwrap().to_string(), "C-1");
    }

    #[test]
    fn at_saturates() {
        assert_eq!(Note::at(PitchClass::C, -3).midi(), 0);
        assert_eq!(Note::at(PitchClass::B, 12).midi(), 127);
    }

    #[test]
    fn a4_is_440() {
        assert!((Note::at(PitchClass::A, 4).freq() - 440.0).abs() < 1e-3);
    }

    #[test]
    fn chords_match_sonic_pi() {
        let c_major: Vec<u8> = chord(Note::at(PitchClass::C, 4), ChordQuality::Major)
            .into_iter()
            .map(Note::midi)
            .collect();
        assert_eq!(c_major, vec![60, 64, 67]);

        let a_minor: Vec<u8> = chord(Note::at(PitchClass::A, 4), ChordQuality::Minor)
            .into_iter()
            .map(Note::midi)
            .collect();
        assert_eq!(a_minor, vec![69, 72, 76]);
    }

    #[test]
    fn chord_drops_out_of_range_tones() {
        let top = Note::from_midi(125).unwrap();
        assert_eq!(chord(top, ChordQuality::Major).len(), 1);
    }

    #[test]
    fn pitch_notes_cover_both_variants() {
        let single = Pitch::from(Note::at(PitchClass::E, 4));
        assert_eq!(single.notes().len(), 1);
        let triad = Pitch::from(chord(Note::at(PitchClass::F, 4), ChordQuality::Major));
        assert_eq!(triad.notes().len(), 3);
        assert_eq!(triad.to_string(), "[F4 A4 C5]");
    }
}
