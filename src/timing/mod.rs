mod clock;
mod scheduler;
mod sequence;
mod state_machine;

pub use clock::Clock;
pub use scheduler::{EventProducer, SchedulerError, Timeline, drain_into};
pub use sequence::{Action, CompiledScore, LoopSequence, TimedEvent};
pub use state_machine::{LoopCursor, LoopState, Transition};
