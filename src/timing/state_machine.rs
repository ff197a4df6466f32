use super::{LoopSequence, TimedEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopState {
    Idle,
    Play { event: usize },
    Advance { beats: f64, then: usize },
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition<'a> {
    Started { iteration: u64 },
    Played(&'a TimedEvent),
    Advanced(f64),
}

/// Walks one loop forever: idle, play, advance, and back to the top once
/// the body is exhausted. There is no terminal state.
#[derive(Debug, Clone)]
pub struct LoopCursor<'a> {
    sequence: &'a LoopSequence,
    state: LoopState,
    iteration: u64,
}

impl<'a> LoopCursor<'a> {
    pub fn new(sequence: &'a LoopSequence) -> Self {
        Self {
            sequence,
            state: LoopState::Idle,
            iteration: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    fn gap_after(&self, event: usize) -> f64 {
        let here = self.sequence.events[event].offset;
        let next = self
            .sequence
            .events
            .get(event + 1)
            .map_or(self.sequence.cycle_beats, |e| e.offset);
        next - here
    }
}

impl<'a> Iterator for LoopCursor<'a> {
    type Item = Transition<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                LoopState::Idle => {
                    let lead_in = self
                        .sequence
                        .events
                        .first()
                        .map_or(self.sequence.cycle_beats, |e| e.offset);
                    self.state = LoopState::Advance {
                        beats: lead_in,
                        then: 0,
                    };
                    return Some(Transition::Started {
                        iteration: self.iteration,
                    });
                }
                LoopState::Play { event } => {
                    self.state = LoopState::Advance {
                        beats: self.gap_after(event),
                        then: event + 1,
                    };
                    return Some(Transition::Played(&self.sequence.events[event]));
                }
                LoopState::Advance { beats, then } => {
                    self.state = if then < self.sequence.events.len() {
                        LoopState::Play { event: then }
                    } else {
                        LoopState::Restart
                    };
                    if beats > 0.0 {
                        return Some(Transition::Advanced(beats));
                    }
                }
                LoopState::Restart => {
                    self.iteration += 1;
                    self.state = LoopState::Idle;
                }
            }
        }
    }
}
