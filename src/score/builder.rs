use super::{LoopDef, Score, Step, validate};
use crate::audio::{NoteParams, Pitch, SampleParams};
use crate::error::ScoreError;

/// Default tempo of a fresh score.
pub const DEFAULT_BPM: f64 = 60.0;

/// Declares a score with the same vocabulary a live-coding session uses:
/// a tempo, a current synth, and named loops.
///
/// ```
/// use loopscore::audio::{Note, NoteParams, PitchClass, SampleParams};
/// use loopscore::score::ScoreBuilder;
///
/// let score = ScoreBuilder::new("demo")
///     .tempo(120.0)
///     .use_synth("piano")
///     .live_loop("lead", |l| {
///         l.note(Note::at(PitchClass::C, 4), 1.0, NoteParams::new().release(1.0))
///     })
///     .live_loop("kick", |l| {
///         l.sync("lead")
///             .sample("drum_bass_soft", SampleParams::new())
///             .sleep(1.0)
///     })
///     .build()
///     .unwrap();
/// assert_eq!(score.loops.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ScoreBuilder {
    name: String,
    bpm: f64,
    current_synth: Option<String>,
    loops: Vec<LoopDef>,
}

impl ScoreBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bpm: DEFAULT_BPM,
            current_synth: None,
            loops: Vec::new(),
        }
    }

    pub fn tempo(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    /// Synth inherited by every loop declared after this call.
    pub fn use_synth(mut self, name: &str) -> Self {
        self.current_synth = Some(name.to_string());
        self
    }

    pub fn live_loop(mut self, name: &str, body: impl FnOnce(LoopBuilder) -> LoopBuilder) -> Self {
        let builder = LoopBuilder {
            def: LoopDef {
                name: name.to_string(),
                sync: None,
                synth: self.current_synth.clone(),
                steps: Vec::new(),
            },
        };
        self.loops.push(body(builder).def);
        self
    }

    /// The score as declared, without validation.
    pub fn into_score(self) -> Score {
        Score {
            name: self.name,
            bpm: self.bpm,
            loops: self.loops,
        }
    }

    pub fn build(self) -> Result<Score, ScoreError> {
        let score = self.into_score();
        validate(&score)?;
        Ok(score)
    }
}

#[derive(Debug, Clone)]
pub struct LoopBuilder {
    def: LoopDef,
}

impl LoopBuilder {
    pub fn sync(mut self, target: &str) -> Self {
        self.def.sync = Some(target.to_string());
        self
    }

    pub fn use_synth(mut self, name: &str) -> Self {
        self.def.steps.push(Step::UseSynth(name.to_string()));
        self
    }

    /// Sounds a pitch without moving the cursor.
    pub fn play(self, pitch: impl Into<Pitch>, params: NoteParams) -> Self {
        self.note(pitch, 0.0, params)
    }

    pub fn note(mut self, pitch: impl Into<Pitch>, duration: f64, params: NoteParams) -> Self {
        self.def.steps.push(Step::Note {
            pitch: pitch.into(),
            duration,
            params,
        });
        self
    }

    pub fn sample(mut self, name: &str, params: SampleParams) -> Self {
        self.def.steps.push(Step::Sample {
            name: name.to_string(),
            params,
        });
        self
    }

    pub fn sleep(mut self, beats: f64) -> Self {
        self.def.steps.push(Step::Sleep(beats));
        self
    }

    /// Plays each pitch in turn, waiting `times[i]` beats after the i-th.
    /// `times` wraps around when it is shorter than the pattern.
    pub fn play_pattern_timed<P: Into<Pitch>>(
        mut self,
        pitches: impl IntoIterator<Item = P>,
        times: &[f64],
        params: NoteParams,
    ) -> Self {
        for (i, pitch) in pitches.into_iter().enumerate() {
            let duration = if times.is_empty() {
                0.0
            } else {
                times[i % times.len()]
            };
            self.def.steps.push(Step::Note {
                pitch: pitch.into(),
                duration,
                params,
            });
        }
        self
    }
}
