use std::collections::VecDeque;
use std::sync::Arc;

use ringbuf::traits::Producer;
use thiserror::Error;

use super::{CompiledScore, LoopCursor, Transition};
use crate::events::{Event, ScheduledEvent};

pub type EventProducer = ringbuf::HeapProd<ScheduledEvent>;

const EPSILON: f64 = 1e-9;

/// Where every loop iteration starts, worked out lazily from an immutable
/// score.
///
/// A loop synced to another starts with its target's first iteration. When
/// an iteration ends it restarts straight away if it ends on a target
/// boundary, or if one more whole iteration fits before the next boundary.
/// Otherwise it waits for that boundary.
///
/// Starts are kept from the last [`Timeline::forget_before`] on, so a
/// timeline that runs for hours stays small.
#[derive(Debug, Clone)]
pub struct Timeline {
    score: Arc<CompiledScore>,
    origin: f64,
    starts: Vec<Vec<f64>>,
    /// Iteration number of each loop's first kept start.
    first: Vec<u64>,
}

impl Timeline {
    pub fn new(score: Arc<CompiledScore>) -> Self {
        Self::starting_at(score, 0.0)
    }

    /// A timeline whose unsynced loops all begin at `origin`.
    pub fn starting_at(score: Arc<CompiledScore>, origin: f64) -> Self {
        let starts = vec![Vec::new(); score.loops.len()];
        let first = vec![0; score.loops.len()];
        Self {
            score,
            origin,
            starts,
            first,
        }
    }

    pub fn score(&self) -> &Arc<CompiledScore> {
        &self.score
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// # Panics
    ///
    /// If the iteration ended before a beat passed to `forget_before`.
    pub fn iteration_start(&mut self, loop_id: usize, iteration: u64) -> f64 {
        let first = self.first[loop_id];
        assert!(
            iteration >= first,
            "iteration {iteration} of loop {loop_id} was forgotten"
        );
        let wanted = (iteration - first) as usize;
        while self.starts[loop_id].len() <= wanted {
            self.push_next_start(loop_id);
        }
        self.starts[loop_id][wanted]
    }

    /// Iterations of `loop_id` begun at or before `beat`. Forgotten
    /// iterations count as begun.
    pub fn cycle_count(&mut self, loop_id: usize, beat: f64) -> u64 {
        self.extend_past(loop_id, beat);
        self.first[loop_id] + self.starts[loop_id].partition_point(|&s| s <= beat + EPSILON) as u64
    }

    /// Drops the starts of iterations that ended before `beat`. Each loop
    /// keeps at least its latest start so later iterations can still be
    /// worked out. Windows that begin before `beat` lose those iterations.
    pub fn forget_before(&mut self, beat: f64) {
        for loop_id in 0..self.starts.len() {
            self.extend_past(loop_id, beat);
        }
        for (loop_id, starts) in self.starts.iter_mut().enumerate() {
            let cycle = self.score.loops[loop_id].cycle_beats;
            let ended = starts
                .partition_point(|&s| s + cycle < beat - EPSILON)
                .min(starts.len().saturating_sub(1));
            starts.drain(..ended);
            self.first[loop_id] += ended as u64;
        }
    }

    /// Every cue and trigger in `[from, to)`, in dispatch order.
    pub fn events_between(&mut self, from: f64, to: f64) -> Vec<ScheduledEvent> {
        let mut events = Vec::new();
        if to <= from {
            return events;
        }

        for loop_id in 0..self.score.loops.len() {
            self.extend_past(loop_id, to);
            let score = Arc::clone(&self.score);
            let sequence = &score.loops[loop_id];
            let starts = &self.starts[loop_id];
            let skip = starts.partition_point(|&s| s + sequence.cycle_beats < from - EPSILON);

            for (k, &start) in starts.iter().enumerate().skip(skip) {
                if start >= to {
                    break;
                }
                let iteration = self.first[loop_id] + k as u64;
                let mut local = 0.0;
                for transition in LoopCursor::new(sequence) {
                    match transition {
                        Transition::Started { iteration: 0 } => {
                            if start >= from {
                                events.push(ScheduledEvent {
                                    beat: start,
                                    loop_id,
                                    iteration,
                                    event: Event::Cue,
                                });
                            }
                        }
                        Transition::Started { .. } => break,
                        Transition::Advanced(beats) => local += beats,
                        Transition::Played(timed) => {
                            let beat = start + local;
                            if beat >= to {
                                break;
                            }
                            if beat >= from {
                                events.push(ScheduledEvent {
                                    beat,
                                    loop_id,
                                    iteration,
                                    event: Event::Trigger {
                                        step: timed.step,
                                        action: timed.action.clone(),
                                    },
                                });
                            }
                        }
                    }
                }
            }
        }

        events.sort_by(ScheduledEvent::sort_key_cmp);
        events
    }

    fn extend_past(&mut self, loop_id: usize, beat: f64) {
        while self.starts[loop_id].last().is_none_or(|&s| s <= beat) {
            self.push_next_start(loop_id);
        }
    }

    fn push_next_start(&mut self, loop_id: usize) {
        let sequence = &self.score.loops[loop_id];
        let cycle = sequence.cycle_beats;
        let sync = sequence.sync;
        let count = self.first[loop_id] + self.starts[loop_id].len() as u64;

        let next = match (sync, self.starts[loop_id].last().copied()) {
            (None, _) => self.origin + count as f64 * cycle,
            (Some(target), None) => self.iteration_start(target, 0),
            (Some(target), Some(previous)) => {
                let end = previous + cycle;
                let boundary = self.boundary_at_or_after(target, end);
                if (boundary - end).abs() <= EPSILON {
                    boundary
                } else if end + cycle <= boundary + EPSILON {
                    end
                } else {
                    boundary
                }
            }
        };

        self.starts[loop_id].push(next);
    }

    fn boundary_at_or_after(&mut self, loop_id: usize, beat: f64) -> f64 {
        self.extend_past(loop_id, beat);
        let starts = &self.starts[loop_id];
        let idx = starts.partition_point(|&s| s < beat - EPSILON);
        starts[idx]
    }
}

/// Pushes queued events into the ring until it is full. Whatever did not
/// fit stays at the front of `queue`.
pub fn drain_into(
    producer: &mut EventProducer,
    queue: &mut VecDeque<ScheduledEvent>,
) -> Result<usize, SchedulerError> {
    let mut pushed = 0;
    while let Some(event) = queue.pop_front() {
        if let Err(event) = producer.try_push(event) {
            queue.push_front(event);
            return Err(SchedulerError::BufferFull { pushed });
        }
        pushed += 1;
    }
    Ok(pushed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("event buffer is full after {pushed} event(s)")]
    BufferFull { pushed: usize },
}
