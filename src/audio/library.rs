use std::collections::HashMap;

use super::{NoteParams, SampleParams};
use crate::host::HostError;

/// Synths and samples a host knows how to sound, with the General MIDI
/// program or percussion key each one maps to.
#[derive(Debug, Clone)]
pub struct SoundLibrary {
    synths: HashMap<String, u8>,
    samples: HashMap<String, u8>,
}

const SYNTHS: &[(&str, u8)] = &[
    ("beep", 80),
    ("sine", 80),
    ("square", 80),
    ("tri", 80),
    ("saw", 81),
    ("dsaw", 81),
    ("piano", 0),
    ("fm", 38),
    ("tb303", 38),
    ("pretty_bell", 14),
    ("dull_bell", 14),
    ("pluck", 24),
    ("hollow", 89),
    ("prophet", 90),
    ("blade", 91),
];

const SAMPLES: &[(&str, u8)] = &[
    ("drum_bass_soft", 35),
    ("drum_bass_hard", 36),
    ("drum_heavy_kick", 36),
    ("drum_snare_soft", 38),
    ("drum_snare_hard", 40),
    ("drum_cymbal_closed", 42),
    ("drum_cymbal_pedal", 44),
    ("drum_cymbal_open", 46),
    ("drum_tom_mid_soft", 47),
    ("drum_cymbal_hard", 49),
    ("drum_cymbal_soft", 51),
    ("drum_splash_soft", 55),
    ("misc_crow", 76),
    ("elec_blip", 80),
];

impl Default for SoundLibrary {
    fn default() -> Self {
        Self {
            synths: SYNTHS.iter().map(|(n, p)| (n.to_string(), *p)).collect(),
            samples: SAMPLES.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
        }
    }
}

impl SoundLibrary {
    pub fn empty() -> Self {
        Self {
            synths: HashMap::new(),
            samples: HashMap::new(),
        }
    }

    pub fn with_synth(mut self, name: &str, program: u8) -> Self {
        self.synths.insert(name.to_string(), program.min(127));
        self
    }

    pub fn with_sample(mut self, name: &str, key: u8) -> Self {
        self.samples.insert(name.to_string(), key.min(127));
        self
    }

    pub fn synth_program(&self, name: &str) -> Option<u8> {
        self.synths.get(name).copied()
    }

    pub fn sample_key(&self, name: &str) -> Option<u8> {
        self.samples.get(name).copied()
    }

    pub fn check_synth(&self, name: &str) -> Result<(), HostError> {
        if self.synths.contains_key(name) {
            Ok(())
        } else {
            Err(HostError::UnknownSynth(name.to_string()))
        }
    }

    pub fn check_sample(&self, name: &str) -> Result<(), HostError> {
        if self.samples.contains_key(name) {
            Ok(())
        } else {
            Err(HostError::UnknownSample(name.to_string()))
        }
    }

    pub fn check_note_params(&self, params: &NoteParams) -> Result<(), HostError> {
        check_param("release", params.release, |v| v >= 0.0)?;
        check_param("amp", params.amp, |v| v >= 0.0)
    }

    pub fn check_sample_params(&self, params: &SampleParams) -> Result<(), HostError> {
        check_param("rate", params.rate, |v| v != 0.0)?;
        check_param("amp", params.amp, |v| v >= 0.0)
    }
}

fn check_param(
    name: &str,
    value: Option<f64>,
    in_range: impl Fn(f64) -> bool,
) -> Result<(), HostError> {
    match value {
        Some(v) if !v.is_finite() || !in_range(v) => Err(HostError::InvalidParameter {
            name: name.to_string(),
            value: v,
        }),
        _ => Ok(()),
    }
}
