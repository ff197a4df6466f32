pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod player;
pub mod score;
pub mod timing;
pub mod watch;

pub use config::PlaybackConfig;
pub use engine::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use error::{ConfigError, EngineError, ScoreError, ScoreIssue, ValidationErrors};
pub use host::{Host, HostError, LogHost, MidiHost, RecordingHost};
pub use player::{PlaybackReport, PlayerError, ScorePlayer};
pub use score::{Score, ScoreBuilder, piano_pizza};
pub use watch::watch_score;
