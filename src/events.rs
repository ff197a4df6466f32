use crate::timing::Action;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    /// Absolute beat since playback started.
    pub beat: f64,
    pub loop_id: usize,
    pub iteration: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A loop iteration begins. Synced loops join on these.
    Cue,
    Trigger { step: usize, action: Action },
}

impl ScheduledEvent {
    pub(crate) fn sort_key_cmp(&self, other: &Self) -> std::cmp::Ordering {
        let rank = |e: &ScheduledEvent| match &e.event {
            Event::Cue => (0, 0),
            Event::Trigger { step, .. } => (1, *step),
        };
        self.beat
            .total_cmp(&other.beat)
            .then(self.loop_id.cmp(&other.loop_id))
            .then(self.iteration.cmp(&other.iteration))
            .then(rank(self).cmp(&rank(other)))
    }
}
