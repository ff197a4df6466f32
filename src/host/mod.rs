mod log;
mod midi;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::audio::{NoteParams, Pitch, SampleParams, SoundLibrary};

pub use log::LogHost;
pub use midi::{MidiHost, amp_to_velocity};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("invalid tempo {0} bpm")]
    InvalidTempo(f64),
    #[error("unknown synth '{0}'")]
    UnknownSynth(String),
    #[error("unknown sample '{0}'")]
    UnknownSample(String),
    #[error("invalid value {value} for '{name}'")]
    InvalidParameter { name: String, value: f64 },
    #[error("audio backend failure: {0}")]
    Backend(String),
}

impl HostError {
    /// Whether the failure takes down every loop rather than just the one
    /// whose event triggered it.
    pub fn is_global(&self) -> bool {
        matches!(self, HostError::InvalidTempo(_) | HostError::Backend(_))
    }
}

/// The audio runtime a score is played on. It owns the sound; the player
/// only tells it what to do and when.
pub trait Host {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError>;
    fn select_synth(&mut self, name: &str) -> Result<(), HostError>;
    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError>;
    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError>;
    /// Lets `beats` of musical time pass.
    fn advance(&mut self, beats: f64) -> Result<(), HostError>;
    /// Playback is over; silence whatever is still sounding.
    fn stop(&mut self) -> Result<(), HostError> {
        Ok(())
    }
}

impl<H: Host + ?Sized> Host for Box<H> {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError> {
        (**self).set_tempo(bpm)
    }

    fn select_synth(&mut self, name: &str) -> Result<(), HostError> {
        (**self).select_synth(name)
    }

    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError> {
        (**self).play(pitch, params)
    }

    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError> {
        (**self).play_sample(name, params)
    }

    fn advance(&mut self, beats: f64) -> Result<(), HostError> {
        (**self).advance(beats)
    }

    fn stop(&mut self) -> Result<(), HostError> {
        (**self).stop()
    }
}

/// Lets a host be inspected from another thread while the engine drives it.
impl<H: Host + ?Sized> Host for Arc<Mutex<H>> {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError> {
        self.lock().set_tempo(bpm)
    }

    fn select_synth(&mut self, name: &str) -> Result<(), HostError> {
        self.lock().select_synth(name)
    }

    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError> {
        self.lock().play(pitch, params)
    }

    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError> {
        self.lock().play_sample(name, params)
    }

    fn advance(&mut self, beats: f64) -> Result<(), HostError> {
        self.lock().advance(beats)
    }

    fn stop(&mut self) -> Result<(), HostError> {
        self.lock().stop()
    }
}

pub(crate) fn check_tempo(bpm: f64) -> Result<(), HostError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(HostError::InvalidTempo(bpm))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SetTempo(f64),
    SelectSynth(String),
    Play { pitch: Pitch, params: NoteParams },
    PlaySample { name: String, params: SampleParams },
    Advance(f64),
    Stop,
}

/// Keeps every accepted call. With a library it refuses what the library
/// does not know, like a real backend would.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Vec<HostCall>,
    library: Option<SoundLibrary>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(library: SoundLibrary) -> Self {
        Self {
            calls: Vec::new(),
            library: Some(library),
        }
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    /// Sum of all advances so far.
    pub fn beat(&self) -> f64 {
        self.calls
            .iter()
            .map(|c| match c {
                HostCall::Advance(beats) => *beats,
                _ => 0.0,
            })
            .sum()
    }
}

impl Host for RecordingHost {
    fn set_tempo(&mut self, bpm: f64) -> Result<(), HostError> {
        check_tempo(bpm)?;
        self.calls.push(HostCall::SetTempo(bpm));
        Ok(())
    }

    fn select_synth(&mut self, name: &str) -> Result<(), HostError> {
        if let Some(library) = &self.library {
            library.check_synth(name)?;
        }
        self.calls.push(HostCall::SelectSynth(name.to_string()));
        Ok(())
    }

    fn play(&mut self, pitch: &Pitch, params: &NoteParams) -> Result<(), HostError> {
        if let Some(library) = &self.library {
            library.check_note_params(params)?;
        }
        self.calls.push(HostCall::Play {
            pitch: pitch.clone(),
            params: *params,
        });
        Ok(())
    }

    fn play_sample(&mut self, name: &str, params: &SampleParams) -> Result<(), HostError> {
        if let Some(library) = &self.library {
            library.check_sample(name)?;
            library.check_sample_params(params)?;
        }
        self.calls.push(HostCall::PlaySample {
            name: name.to_string(),
            params: *params,
        });
        Ok(())
    }

    fn advance(&mut self, beats: f64) -> Result<(), HostError> {
        self.calls.push(HostCall::Advance(beats));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HostError> {
        self.calls.push(HostCall::Stop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Note, PitchClass};

    #[test]
    fn global_errors() {
        assert!(HostError::InvalidTempo(0.0).is_global());
        assert!(HostError::Backend("gone".into()).is_global());
        assert!(!HostError::UnknownSample("x".into()).is_global());
        assert!(!HostError::UnknownSynth("x".into()).is_global());
    }

    #[test]
    fn recording_host_without_library_accepts_anything() {
        let mut host = RecordingHost::new();
        host.select_synth("anything").unwrap();
        host.play_sample("whatever", &SampleParams::new()).unwrap();
        host.advance(0.5).unwrap();
        host.advance(0.25).unwrap();
        assert_eq!(host.calls().len(), 4);
        assert_eq!(host.beat(), 0.75);
        assert!(host.set_tempo(-1.0).is_err());
    }

    #[test]
    fn recording_host_with_library_refuses_unknown_names() {
        let mut host = RecordingHost::with_library(SoundLibrary::default());
        assert!(host.select_synth("piano").is_ok());
        assert_eq!(
            host.select_synth("kazoo"),
            Err(HostError::UnknownSynth("kazoo".into()))
        );
        assert!(host.play_sample("boing", &SampleParams::new()).is_err());
        assert_eq!(host.take_calls(), vec![HostCall::SelectSynth("piano".into())]);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn shared_host_records_through_the_lock() {
        let shared = Arc::new(Mutex::new(RecordingHost::new()));
        let mut boxed: Box<dyn Host + Send> = Box::new(Arc::clone(&shared));
        boxed
            .play(&Pitch::from(Note::at(PitchClass::C, 4)), &NoteParams::new())
            .unwrap();
        boxed.stop().unwrap();
        assert_eq!(shared.lock().calls().len(), 2);
        assert_eq!(shared.lock().calls()[1], HostCall::Stop);
    }
}
