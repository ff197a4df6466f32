use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ValidationErrors;
use crate::events::{Event, ScheduledEvent};
use crate::host::{Host, HostError};
use crate::score::Score;
use crate::timing::{Action, CompiledScore, Timeline};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Score(#[from] ValidationErrors),

    #[error("playback stopped: {0}")]
    Global(#[source] HostError),

    #[error("playback stopped by loop '{loop_name}' step {step}: {source}")]
    Host {
        loop_name: String,
        step: usize,
        #[source]
        source: HostError,
    },
}

/// A loop the host refused to play. The loop stays silent from then on;
/// the others keep going.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFault {
    pub loop_id: usize,
    pub loop_name: String,
    pub step: usize,
    pub iteration: u64,
    pub beat: f64,
    pub error: HostError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Cue,
    Played,
    Skipped,
    Faulted(LoopFault),
}

/// Turns scheduled events into host calls: advances the host to each
/// event, reselects the synth only when it changes, and mutes loops whose
/// events the host refuses.
#[derive(Debug)]
pub struct Dispatcher {
    score: Arc<CompiledScore>,
    cursor: f64,
    current_synth: Option<String>,
    faulted: Vec<bool>,
}

impl Dispatcher {
    pub fn new(score: Arc<CompiledScore>, start_beat: f64) -> Self {
        let faulted = vec![false; score.loops.len()];
        Self {
            score,
            cursor: start_beat,
            current_synth: None,
            faulted,
        }
    }

    pub fn start(&mut self, host: &mut dyn Host) -> Result<(), PlayerError> {
        host.set_tempo(self.score.clock.bpm())
            .map_err(PlayerError::Global)
    }

    /// Swaps in a reloaded score. Faults are forgotten, the synth stays
    /// selected on the host, and the tempo is pushed again if it changed.
    pub fn set_score(
        &mut self,
        host: &mut dyn Host,
        score: Arc<CompiledScore>,
    ) -> Result<(), PlayerError> {
        let tempo_changed = score.clock != self.score.clock;
        self.faulted = vec![false; score.loops.len()];
        self.score = score;
        if tempo_changed {
            self.start(host)?;
        }
        Ok(())
    }

    pub fn score(&self) -> &Arc<CompiledScore> {
        &self.score
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn is_faulted(&self, loop_id: usize) -> bool {
        self.faulted.get(loop_id).copied().unwrap_or(false)
    }

    pub fn advance_to(&mut self, host: &mut dyn Host, beat: f64) -> Result<(), PlayerError> {
        if beat > self.cursor {
            host.advance(beat - self.cursor)
                .map_err(PlayerError::Global)?;
            self.cursor = beat;
        }
        Ok(())
    }

    pub fn dispatch(
        &mut self,
        host: &mut dyn Host,
        event: &ScheduledEvent,
    ) -> Result<Dispatched, PlayerError> {
        let Event::Trigger { step, action } = &event.event else {
            return Ok(Dispatched::Cue);
        };
        if event.loop_id >= self.faulted.len() || self.faulted[event.loop_id] {
            return Ok(Dispatched::Skipped);
        }

        self.advance_to(host, event.beat)?;

        let result = match action {
            Action::Play {
                synth,
                pitch,
                params,
            } => self
                .select(host, synth)
                .and_then(|_| host.play(pitch, params)),
            Action::Sample { name, params } => host.play_sample(name, params),
        };

        let Err(error) = result else {
            return Ok(Dispatched::Played);
        };

        let loop_name = self.score.loops[event.loop_id].name.clone();
        if error.is_global() {
            return Err(PlayerError::Host {
                loop_name,
                step: *step,
                source: error,
            });
        }

        warn!(
            loop_name = %loop_name,
            step = *step,
            iteration = event.iteration,
            beat = event.beat,
            error = %error,
            "loop muted after host error"
        );
        self.faulted[event.loop_id] = true;
        Ok(Dispatched::Faulted(LoopFault {
            loop_id: event.loop_id,
            loop_name,
            step: *step,
            iteration: event.iteration,
            beat: event.beat,
            error,
        }))
    }

    fn select(&mut self, host: &mut dyn Host, synth: &str) -> Result<(), HostError> {
        if self.current_synth.as_deref() != Some(synth) {
            host.select_synth(synth)?;
            self.current_synth = Some(synth.to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub beats: f64,
    pub events_dispatched: usize,
    /// Iterations begun per loop, in score order.
    pub cycles: Vec<(String, u64)>,
    pub faults: Vec<LoopFault>,
}

/// Plays a score against a host as fast as the host accepts calls, with
/// no wall clock involved.
pub struct ScorePlayer {
    timeline: Timeline,
}

impl ScorePlayer {
    pub fn new(score: &Score) -> Result<Self, PlayerError> {
        let compiled = CompiledScore::compile(score)?;
        Ok(Self::from_compiled(Arc::new(compiled)))
    }

    pub fn from_compiled(score: Arc<CompiledScore>) -> Self {
        Self {
            timeline: Timeline::new(score),
        }
    }

    pub fn timeline(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Plays the first `beats` beats and leaves the host at `beats`.
    pub fn play(&mut self, host: &mut dyn Host, beats: f64) -> Result<PlaybackReport, PlayerError> {
        let score = Arc::clone(self.timeline.score());
        info!(score = %score.name, bpm = score.clock.bpm(), beats, "playing score");

        let mut dispatcher = Dispatcher::new(Arc::clone(&score), 0.0);
        dispatcher.start(host)?;

        let mut cycles: Vec<(String, u64)> =
            score.loops.iter().map(|l| (l.name.clone(), 0)).collect();
        let mut faults = Vec::new();
        let mut events_dispatched = 0;

        for event in self.timeline.events_between(0.0, beats) {
            match dispatcher.dispatch(host, &event)? {
                Dispatched::Cue => {
                    cycles[event.loop_id].1 += 1;
                    debug!(loop_name = %score.loops[event.loop_id].name, iteration = event.iteration, beat = event.beat, "cue");
                }
                Dispatched::Played => events_dispatched += 1,
                Dispatched::Skipped => {}
                Dispatched::Faulted(fault) => faults.push(fault),
            }
        }
        dispatcher.advance_to(host, beats)?;

        Ok(PlaybackReport {
            beats,
            events_dispatched,
            cycles,
            faults,
        })
    }
}
