use tracing::{debug, info};

use super::{Host, HostError, check_tempo};
use crate::audio::{NoteParams, Pitch, SampleParams, SoundLibrary};
use crate::score::DEFAULT_SYNTH;

/// Prints what would be played instead of playing it.
#[derive(Debug)]
pub struct LogHost {
    library: SoundLibrary,
    bpm: f64,
    beat: f64,
    synth: String,
}

impl LogHost {
    pub fn new(library: SoundLibrary) -> Self {
        Self {
            library,
            bpm: 0.0,
            beat: 0.0,
            synth: DEFAULT_SYNTH.to_string(),
        }
    }

    pub fn beat(&self) -> f64 {
        self.beat
    }

    pub fn synth(&self) -> &str {
        &self.synth
    }
}

impl Default for LogHost {
    fn default() -> Self {
        Self::new(SoundLibrary::default())
    }
}

impl Host for LogHost {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError> {
        check_tempo(bpm)?;
        self.bpm = bpm;
        info!(bpm, "tempo set");
        Ok(())
    }

    fn select_synth(&mut self, name: &str) -> Result<(), HostError> {
        self.library.check_synth(name)?;
        self.synth = name.to_string();
        debug!(beat = self.beat, synth = name, "synth selected");
        Ok(())
    }

    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError> {
        self.library.check_note_params(params)?;
        info!(
            beat = self.beat,
            synth = %self.synth,
            pitch = %pitch,
            release = params.release_or_default(),
            amp = params.amp_or_default(),
            "play"
        );
        Ok(())
    }

    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError> {
        self.library.check_sample(name)?;
        self.library.check_sample_params(params)?;
        info!(
            beat = self.beat,
            sample = name,
            rate = params.rate_or_default(),
            amp = params.amp_or_default(),
            "sample"
        );
        Ok(())
    }

    fn advance(&mut self, beats: f64) -> Result<(), HostError> {
        self.beat += beats;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HostError> {
        info!(beat = self.beat, "stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Note, PitchClass};

    #[test]
    fn tracks_position_and_synth() {
        let mut host = LogHost::default();
        host.set_tempo(120.0).unwrap();
        assert_eq!(host.synth(), "beep");
        host.select_synth("piano").unwrap();
        host.advance(1.5).unwrap();
        host.play(&Note::at(PitchClass::C, 4).into(), &NoteParams::new())
            .unwrap();
        assert_eq!(host.synth(), "piano");
        assert_eq!(host.beat(), 1.5);
    }

    #[test]
    fn refuses_what_the_library_does_not_know() {
        let mut host = LogHost::new(SoundLibrary::empty());
        assert!(host.select_synth("piano").is_err());
        assert_eq!(host.synth(), "beep");
        assert!(host.play_sample("misc_crow", &SampleParams::new()).is_err());
        assert_eq!(host.set_tempo(0.0), Err(HostError::InvalidTempo(0.0)));
    }
}
