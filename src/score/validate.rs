use std::collections::HashSet;
use std::fmt;

use super::{Score, Step};
use crate::audio::{Pitch, SoundLibrary};
use crate::error::{ScoreIssue, ValidationErrors};

/// Checks the structural rules every playable score obeys. Synth and
/// sample names are left to the host, see [`lint_sounds`].
pub fn validate(score: &Score) -> Result<(), ValidationErrors> {
    let mut issues = Vec::new();

    if !score.bpm.is_finite() || score.bpm <= 0.0 {
        issues.push(ScoreIssue::InvalidTempo(score.bpm));
    }

    let mut seen = HashSet::new();
    for (index, def) in score.loops.iter().enumerate() {
        if def.name.is_empty() {
            issues.push(ScoreIssue::EmptyLoopName { index });
        } else if !seen.insert(def.name.as_str()) {
            issues.push(ScoreIssue::DuplicateLoop(def.name.clone()));
        }

        if let Some(target) = &def.sync {
            if *target == def.name {
                issues.push(ScoreIssue::SelfSync(def.name.clone()));
            } else if score.get_loop(target).is_none() {
                issues.push(ScoreIssue::UnknownSyncTarget {
                    loop_name: def.name.clone(),
                    target: target.clone(),
                });
            }
        }

        let mut malformed = false;
        for (step, s) in def.steps.iter().enumerate() {
            let value = s.duration();
            if !value.is_finite() || value < 0.0 {
                malformed = true;
                issues.push(ScoreIssue::MalformedDuration {
                    loop_name: def.name.clone(),
                    step,
                    value,
                });
            }
            if let Step::Note {
                pitch: Pitch::Chord(notes),
                ..
            } = s
            {
                if notes.is_empty() {
                    issues.push(ScoreIssue::EmptyChord {
                        loop_name: def.name.clone(),
                        step,
                    });
                }
            }
        }

        if !malformed && def.cycle_beats() <= 0.0 {
            issues.push(ScoreIssue::ZeroLengthLoop(def.name.clone()));
        }
    }

    issues.extend(sync_cycles(score));

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(issues))
    }
}

/// Each sync cycle reported once, starting from its first loop in score
/// order. Self syncs are reported elsewhere.
fn sync_cycles(score: &Score) -> Vec<ScoreIssue> {
    let mut reported: HashSet<&str> = HashSet::new();
    let mut issues = Vec::new();

    for def in &score.loops {
        let mut chain = vec![def.name.as_str()];
        let mut current = def;
        while let Some(target) = current.sync.as_deref() {
            if target == current.name {
                break;
            }
            let Some(next) = score.get_loop(target) else {
                break;
            };
            if let Some(pos) = chain.iter().position(|n| *n == target) {
                let cycle = &chain[pos..];
                if pos == 0 && cycle.iter().all(|n| !reported.contains(n)) {
                    reported.extend(cycle.iter().copied());
                    let mut names: Vec<String> = cycle.iter().map(|n| n.to_string()).collect();
                    names.push(target.to_string());
                    issues.push(ScoreIssue::SyncCycle(names));
                }
                break;
            }
            chain.push(target);
            current = next;
        }
    }

    issues
}

/// How a synced loop's cycle relates to its target's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    /// Not synced.
    Free,
    /// Repeats a whole number of times per target cycle.
    Nested { repeats: u32 },
    /// Covers a whole number of target cycles.
    Spanning { cycles: u32 },
    /// Neither; the loop rests this long each time before realigning.
    Waits { rest_beats: f64 },
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Free => write!(f, "free running"),
            Alignment::Nested { repeats } => write!(f, "repeats {repeats}x per sync cycle"),
            Alignment::Spanning { cycles } => write!(f, "spans {cycles} sync cycles"),
            Alignment::Waits { rest_beats } => {
                write!(f, "rests {rest_beats} beats before realigning")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopAlignment {
    pub name: String,
    pub cycle_beats: f64,
    pub sync: Option<String>,
    pub alignment: Alignment,
}

const EPSILON: f64 = 1e-9;

fn whole(ratio: f64) -> Option<u32> {
    let rounded = ratio.round();
    if rounded >= 1.0 && (ratio - rounded).abs() < EPSILON {
        Some(rounded as u32)
    } else {
        None
    }
}

/// Compares each loop's cycle with its sync target's, assuming the target
/// itself runs without rests.
pub fn alignment(score: &Score) -> Vec<LoopAlignment> {
    score
        .loops
        .iter()
        .map(|def| {
            let cycle = def.cycle_beats();
            let target_cycle = def
                .sync
                .as_deref()
                .and_then(|t| score.get_loop(t))
                .map(|t| t.cycle_beats());

            let alignment = match target_cycle {
                None => Alignment::Free,
                Some(target) if cycle <= 0.0 || target <= 0.0 => Alignment::Free,
                Some(target) => {
                    if let Some(repeats) = whole(target / cycle) {
                        Alignment::Nested { repeats }
                    } else if let Some(cycles) = whole(cycle / target) {
                        Alignment::Spanning { cycles }
                    } else {
                        let spanned = (cycle / target).ceil();
                        let fits = (target / cycle).floor();
                        let rest_beats = if cycle < target {
                            target - fits * cycle
                        } else {
                            spanned * target - cycle
                        };
                        Alignment::Waits { rest_beats }
                    }
                }
            };

            LoopAlignment {
                name: def.name.clone(),
                cycle_beats: cycle,
                sync: def.sync.clone(),
                alignment,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundWarning {
    pub loop_name: String,
    pub step: Option<usize>,
    pub message: String,
}

impl fmt::Display for SoundWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "loop '{}' step {}: {}", self.loop_name, step, self.message),
            None => write!(f, "loop '{}': {}", self.loop_name, self.message),
        }
    }
}

/// Names and parameters a host backed by `library` would refuse.
pub fn lint_sounds(score: &Score, library: &SoundLibrary) -> Vec<SoundWarning> {
    let mut warnings = Vec::new();

    for def in &score.loops {
        if let Err(e) = library.check_synth(def.initial_synth()) {
            warnings.push(SoundWarning {
                loop_name: def.name.clone(),
                step: None,
                message: e.to_string(),
            });
        }

        for (step, s) in def.steps.iter().enumerate() {
            let result = match s {
                Step::Note { params, .. } => library.check_note_params(params),
                Step::Sample { name, params } => library
                    .check_sample(name)
                    .and_then(|_| library.check_sample_params(params)),
                Step::UseSynth(name) => library.check_synth(name),
                Step::Sleep(_) => Ok(()),
            };
            if let Err(e) = result {
                warnings.push(SoundWarning {
                    loop_name: def.name.clone(),
                    step: Some(step),
                    message: e.to_string(),
                });
            }
        }
    }

    warnings
}
