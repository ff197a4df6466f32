mod library;
mod params;
mod pitch;

pub use library::SoundLibrary;
pub use params::{DEFAULT_AMP, DEFAULT_RATE, DEFAULT_RELEASE, NoteParams, SampleParams};
pub use pitch::{ChordQuality, Note, NoteError, Pitch, PitchClass, chord};

pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
