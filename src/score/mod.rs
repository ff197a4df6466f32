mod builder;
mod library;
mod validate;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::{NoteParams, Pitch, SampleParams};
use crate::error::ScoreError;

pub use builder::{LoopBuilder, ScoreBuilder};
pub use library::piano_pizza;
pub use validate::{Alignment, LoopAlignment, SoundWarning, alignment, lint_sounds, validate};

/// Synth a loop falls back to when nothing selected one.
pub const DEFAULT_SYNTH: &str = "beep";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Sound `pitch`, then move the loop cursor on by `duration` beats.
    Note {
        pitch: Pitch,
        duration: f64,
        #[serde(default)]
        params: NoteParams,
    },
    /// Trigger a sample. How long it lasts is up to the following sleep.
    Sample {
        name: String,
        #[serde(default)]
        params: SampleParams,
    },
    Sleep(f64),
    UseSynth(String),
}

impl Step {
    /// Beats this step moves the loop cursor.
    pub fn duration(&self) -> f64 {
        match self {
            Step::Note { duration, .. } => *duration,
            Step::Sleep(beats) => *beats,
            Step::Sample { .. } | Step::UseSynth(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDef {
    pub name: String,
    /// Loop whose cycle boundaries this one realigns to.
    #[serde(default)]
    pub sync: Option<String>,
    /// Synth in effect when the loop was defined.
    #[serde(default)]
    pub synth: Option<String>,
    pub steps: Vec<Step>,
}

impl LoopDef {
    pub fn cycle_beats(&self) -> f64 {
        self.steps.iter().map(Step::duration).sum()
    }

    pub fn initial_synth(&self) -> &str {
        self.synth.as_deref().unwrap_or(DEFAULT_SYNTH)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub bpm: f64,
    pub loops: Vec<LoopDef>,
}

impl Score {
    pub fn get_loop(&self, name: &str) -> Option<&LoopDef> {
        self.loops.iter().find(|l| l.name == name)
    }

    pub fn loop_index(&self, name: &str) -> Option<usize> {
        self.loops.iter().position(|l| l.name == name)
    }

    pub fn to_ron_string(&self) -> Result<String, ScoreError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Parses and validates a score.
    pub fn from_ron_str(text: &str) -> Result<Self, ScoreError> {
        let score: Score = ron::from_str(text)?;
        validate(&score)?;
        Ok(score)
    }

    pub fn save(&self, path: &Path) -> Result<(), ScoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }
}
