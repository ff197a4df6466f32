use crate::audio::{NoteParams, Pitch, SampleParams};
use crate::error::ValidationErrors;
use crate::score::{LoopDef, Score, Step, validate};

use super::Clock;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Play {
        synth: String,
        pitch: Pitch,
        params: NoteParams,
    },
    Sample {
        name: String,
        params: SampleParams,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    /// Beats from the start of the iteration.
    pub offset: f64,
    /// Index of the step in the loop body that produced this event.
    pub step: usize,
    pub action: Action,
}

/// One loop flattened into events at fixed offsets within its cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSequence {
    pub name: String,
    /// Index of the sync target within the compiled score.
    pub sync: Option<usize>,
    pub cycle_beats: f64,
    pub events: Vec<TimedEvent>,
}

impl LoopSequence {
    /// Flattens a loop body. The synth resets to the loop's inherited synth
    /// at every iteration, so each cycle sounds the same.
    pub fn compile(def: &LoopDef) -> Self {
        let mut synth = def.initial_synth().to_string();
        let mut cursor = 0.0;
        let mut events = Vec::new();

        for (step, s) in def.steps.iter().enumerate() {
            match s {
                Step::Note {
                    pitch,
                    duration,
                    params,
                } => {
                    events.push(TimedEvent {
                        offset: cursor,
                        step,
                        action: Action::Play {
                            synth: synth.clone(),
                            pitch: pitch.clone(),
                            params: *params,
                        },
                    });
                    cursor += duration;
                }
                Step::Sample { name, params } => events.push(TimedEvent {
                    offset: cursor,
                    step,
                    action: Action::Sample {
                        name: name.clone(),
                        params: *params,
                    },
                }),
                Step::Sleep(beats) => cursor += beats,
                Step::UseSynth(name) => synth = name.clone(),
            }
        }

        Self {
            name: def.name.clone(),
            sync: None,
            cycle_beats: cursor,
            events,
        }
    }
}

/// A validated score ready for scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScore {
    pub name: String,
    pub clock: Clock,
    pub loops: Vec<LoopSequence>,
}

impl CompiledScore {
    pub fn compile(score: &Score) -> Result<Self, ValidationErrors> {
        validate(score)?;
        let clock = Clock::new(score.bpm).map_err(|issue| ValidationErrors(vec![issue]))?;

        let loops = score
            .loops
            .iter()
            .map(|def| {
                let mut sequence = LoopSequence::compile(def);
                sequence.sync = def.sync.as_deref().and_then(|t| score.loop_index(t));
                sequence
            })
            .collect();

        Ok(Self {
            name: score.name.clone(),
            clock,
            loops,
        })
    }

    pub fn loop_index(&self, name: &str) -> Option<usize> {
        self.loops.iter().position(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Note, PitchClass};
    use crate::score::{ScoreBuilder, piano_pizza};

    #[test]
    fn drum_beat_offsets() {
        let compiled = CompiledScore::compile(&piano_pizza()).unwrap();
        let drums = &compiled.loops[compiled.loop_index("drum_beat").unwrap()];
        assert_eq!(drums.cycle_beats, 2.0);
        assert_eq!(drums.sync, Some(0));

        let offsets: Vec<(f64, &str)> = drums
            .events
            .iter()
            .map(|e| match &e.action {
                Action::Sample { name, .. } => (e.offset, name.as_str()),
                Action::Play { .. } => panic!("drum_beat only triggers samples"),
            })
            .collect();
        assert_eq!(
            offsets,
            vec![
                (0.0, "drum_bass_soft"),
                (1.0, "drum_cymbal_soft"),
                (1.5, "drum_snare_soft"),
            ]
        );
    }

    #[test]
    fn coffee_arp_plays_on_pretty_bell() {
        let compiled = CompiledScore::compile(&piano_pizza()).unwrap();
        let arp = &compiled.loops[compiled.loop_index("coffee_arp").unwrap()];
        assert_eq!(arp.events.len(), 12);
        assert_eq!(arp.cycle_beats, 3.0);
        for event in &arp.events {
            match &event.action {
                Action::Play { synth, .. } => assert_eq!(synth, "pretty_bell"),
                Action::Sample { .. } => panic!("no samples in coffee_arp"),
            }
        }
        assert_eq!(arp.events[11].offset, 2.75);
    }

    #[test]
    fn pizza_sfx_crows_at_beat_eight() {
        let compiled = CompiledScore::compile(&piano_pizza()).unwrap();
        let sfx = &compiled.loops[compiled.loop_index("pizza_sfx").unwrap()];
        assert_eq!(sfx.cycle_beats, 16.0);
        assert_eq!(sfx.events.len(), 1);
        assert_eq!(sfx.events[0].offset, 8.0);
        assert_eq!(sfx.events[0].step, 1);
    }

    #[test]
    fn synth_changes_apply_to_later_notes_only() {
        let c = Note::at(PitchClass::C, 4);
        let score = ScoreBuilder::new("s")
            .use_synth("piano")
            .live_loop("a", |l| {
                l.note(c, 1.0, NoteParams::new())
                    .use_synth("fm")
                    .note(c, 1.0, NoteParams::new())
            })
            .into_score();
        let sequence = LoopSequence::compile(&score.loops[0]);
        let synths: Vec<&str> = sequence
            .events
            .iter()
            .filter_map(|e| match &e.action {
                Action::Play { synth, .. } => Some(synth.as_str()),
                Action::Sample { .. } => None,
            })
            .collect();
        assert_eq!(synths, vec!["piano", "fm"]);
    }

    #[test]
    fn invalid_scores_do_not_compile() {
        let score = ScoreBuilder::new("s").tempo(-1.0).into_score();
        assert!(CompiledScore::compile(&score).is_err());
    }
}
