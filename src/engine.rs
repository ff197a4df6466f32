use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use ringbuf::{
    HeapCons, HeapRb,
    traits::{Consumer, Split},
};
use tracing::{debug, error, info, warn};

use crate::config::PlaybackConfig;
use crate::events::ScheduledEvent;
use crate::host::Host;
use crate::player::{Dispatched, Dispatcher, PlayerError};
use crate::score::Score;
use crate::timing::{Clock, CompiledScore, EventProducer, SchedulerError, Timeline, drain_into};

#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Loads a score, or swaps it in while playing.
    LoadScore(Score),
    Play,
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    ScoreLoaded { name: String, bpm: f64 },
    PlaybackState { playing: bool },
    Fault {
        loop_name: String,
        step: usize,
        message: String,
    },
    Error { message: String },
}

pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
}

type SharedHost = Arc<Mutex<Box<dyn Host + Send>>>;

pub fn spawn_engine(host: Box<dyn Host + Send>, config: PlaybackConfig) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();
    let host = Arc::new(Mutex::new(host));

    thread::spawn(move || {
        engine_thread(host, config, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
    }
}

fn engine_thread(
    host: SharedHost,
    config: PlaybackConfig,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    let mut score: Option<Arc<CompiledScore>> = None;
    let mut playback: Option<Playback> = None;

    loop {
        match command_rx.recv() {
            Ok(EngineCommand::LoadScore(new_score)) => match CompiledScore::compile(&new_score) {
                Ok(compiled) => {
                    let compiled = Arc::new(compiled);
                    info!(score = %compiled.name, bpm = compiled.clock.bpm(), "score loaded");

                    if let Some(playback) = playback.as_ref().filter(|p| p.is_running()) {
                        playback.scores.store(Arc::clone(&compiled));
                        info!("hot-swapped score");
                    }

                    let _ = update_tx.send(EngineUpdate::ScoreLoaded {
                        name: compiled.name.clone(),
                        bpm: compiled.clock.bpm(),
                    });
                    score = Some(compiled);
                }
                Err(e) => {
                    warn!(error = %e, "score rejected");
                    let _ = update_tx.send(EngineUpdate::Error {
                        message: format!("Failed to load score: {e}"),
                    });
                }
            },

            Ok(EngineCommand::Play) => {
                if playback.as_ref().is_some_and(Playback::is_running) {
                    let _ = update_tx.send(EngineUpdate::PlaybackState { playing: true });
                    continue;
                }
                if let Some(finished) = playback.take() {
                    finished.stop();
                }

                match &score {
                    Some(score) => {
                        playback = Some(Playback::start(
                            Arc::clone(score),
                            Arc::clone(&host),
                            &config,
                            update_tx.clone(),
                        ));
                        let _ = update_tx.send(EngineUpdate::PlaybackState { playing: true });
                    }
                    None => {
                        let _ = update_tx.send(EngineUpdate::Error {
                            message: "No score loaded".to_string(),
                        });
                    }
                }
            }

            Ok(EngineCommand::Stop) => {
                if let Some(playback) = playback.take() {
                    playback.stop();
                }
                let _ = update_tx.send(EngineUpdate::PlaybackState { playing: false });
            }

            Ok(EngineCommand::Shutdown) | Err(crossbeam::channel::RecvError) => {
                if let Some(playback) = playback.take() {
                    playback.stop();
                }
                debug!("engine shut down");
                break;
            }
        }
    }
}

/// The two threads of a running score and what they share.
struct Playback {
    scores: Arc<ArcSwap<CompiledScore>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Playback {
    fn start(
        score: Arc<CompiledScore>,
        host: SharedHost,
        config: &PlaybackConfig,
        update_tx: Sender<EngineUpdate>,
    ) -> Self {
        let clock = score.clock;
        let scores = Arc::new(ArcSwap::new(score));
        let running = Arc::new(AtomicBool::new(true));
        // f64 bits of the beat the dispatch thread has reached
        let position = Arc::new(AtomicU64::new(0.0_f64.to_bits()));
        let poll = config.poll_interval();

        let ring_buffer = HeapRb::<ScheduledEvent>::new(config.ring_capacity.max(1));
        let (producer, consumer) = ring_buffer.split();

        let timing_state = TimingState {
            timeline: Timeline::new(scores.load_full()),
            horizon: 0.0,
            lookahead: config.lookahead_beats.max(0.0),
            queue: VecDeque::new(),
            producer,
        };
        let timing = {
            let scores = Arc::clone(&scores);
            let position = Arc::clone(&position);
            let running = Arc::clone(&running);
            thread::spawn(move || timing_thread(timing_state, scores, position, running, poll))
        };

        let dispatch_state = DispatchState {
            dispatcher: Dispatcher::new(scores.load_full(), 0.0),
            consumer,
            pending: None,
            anchor: Anchor {
                instant: Instant::now(),
                beat: 0.0,
                clock,
            },
        };
        let dispatch = {
            let scores = Arc::clone(&scores);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                dispatch_thread(
                    dispatch_state,
                    host,
                    scores,
                    position,
                    running,
                    update_tx,
                    poll,
                )
            })
        };

        Self {
            scores,
            running,
            threads: vec![timing, dispatch],
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn stop(self) {
        self.running.store(false, Ordering::Release);
        for thread in self.threads {
            if thread.join().is_err() {
                error!("playback thread panicked");
            }
        }
    }
}

struct TimingState {
    timeline: Timeline,
    /// Everything before this beat has been handed to the ring.
    horizon: f64,
    lookahead: f64,
    queue: VecDeque<ScheduledEvent>,
    producer: EventProducer,
}

fn timing_thread(
    mut state: TimingState,
    scores: Arc<ArcSwap<CompiledScore>>,
    position: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    while running.load(Ordering::Acquire) {
        let current = scores.load_full();
        if !Arc::ptr_eq(&current, state.timeline.score()) {
            info!(score = %current.name, from_beat = state.horizon, "rescheduling reloaded score");
            state.timeline = Timeline::starting_at(current, state.horizon);
        }

        let target = f64::from_bits(position.load(Ordering::Acquire)) + state.lookahead;
        if state.queue.is_empty() && target > state.horizon {
            let events = state.timeline.events_between(state.horizon, target);
            state.queue.extend(events);
            state.horizon = target;
            state.timeline.forget_before(target);
        }

        if let Err(SchedulerError::BufferFull { pushed }) =
            drain_into(&mut state.producer, &mut state.queue)
        {
            debug!(pushed, waiting = state.queue.len(), "event buffer full");
        }

        thread::sleep(poll);
    }
}

/// Maps beats to wall-clock instants from a fixed point.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    instant: Instant,
    beat: f64,
    clock: Clock,
}

impl Anchor {
    fn beat_at(&self, now: Instant) -> f64 {
        self.beat
            + self
                .clock
                .duration_to_beats(now.saturating_duration_since(self.instant))
    }

    fn due(&self, beat: f64) -> Instant {
        self.instant + self.clock.beats_to_duration(beat - self.beat)
    }

    /// Keeps the current beat where it is and continues at a new tempo.
    fn rebase(&self, now: Instant, clock: Clock) -> Self {
        Self {
            instant: now,
            beat: self.beat_at(now),
            clock,
        }
    }
}

struct DispatchState {
    dispatcher: Dispatcher,
    consumer: HeapCons<ScheduledEvent>,
    pending: Option<ScheduledEvent>,
    anchor: Anchor,
}

fn dispatch_thread(
    mut state: DispatchState,
    host: SharedHost,
    scores: Arc<ArcSwap<CompiledScore>>,
    position: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    update_tx: Sender<EngineUpdate>,
    poll: Duration,
) {
    let result = dispatch_events(&mut state, &host, &scores, &position, &running, &update_tx, poll);
    if let Err(e) = host.lock().stop() {
        warn!(error = %e, "host did not stop cleanly");
    }
    if let Err(e) = result {
        halt(&running, &update_tx, e);
    }
}

/// Runs until playback is stopped or the host fails for every loop.
fn dispatch_events(
    state: &mut DispatchState,
    host: &SharedHost,
    scores: &ArcSwap<CompiledScore>,
    position: &AtomicU64,
    running: &AtomicBool,
    update_tx: &Sender<EngineUpdate>,
    poll: Duration,
) -> Result<(), PlayerError> {
    state.dispatcher.start(&mut *host.lock())?;

    while running.load(Ordering::Acquire) {
        let now = Instant::now();

        let current = scores.load_full();
        if !Arc::ptr_eq(&current, state.dispatcher.score()) {
            if current.clock != state.anchor.clock {
                state.anchor = state.anchor.rebase(now, current.clock);
                info!(bpm = current.clock.bpm(), "tempo changed");
            }
            state.dispatcher.set_score(&mut *host.lock(), current)?;
        }

        position.store(state.anchor.beat_at(now).to_bits(), Ordering::Release);

        let Some(event) = state.pending.take().or_else(|| state.consumer.try_pop()) else {
            thread::sleep(poll);
            continue;
        };

        let due = state.anchor.due(event.beat);
        if due > now {
            state.pending = Some(event);
            thread::sleep((due - now).min(poll));
            continue;
        }

        if let Dispatched::Faulted(fault) = state.dispatcher.dispatch(&mut *host.lock(), &event)? {
            let _ = update_tx.send(EngineUpdate::Fault {
                loop_name: fault.loop_name,
                step: fault.step,
                message: fault.error.to_string(),
            });
        }
    }
    Ok(())
}

fn halt(running: &AtomicBool, update_tx: &Sender<EngineUpdate>, error: PlayerError) {
    error!(error = %error, "playback stopped");
    running.store(false, Ordering::Release);
    let _ = update_tx.send(EngineUpdate::Error {
        message: error.to_string(),
    });
    let _ = update_tx.send(EngineUpdate::PlaybackState { playing: false });
}
