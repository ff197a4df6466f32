use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse score: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize score: {0}")]
    Serialize(#[from] ron::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

/// One problem found while validating a score. Step indices count from 0
/// within the loop body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreIssue {
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),

    #[error("loop #{index} has an empty name")]
    EmptyLoopName { index: usize },

    #[error("loop '{0}' is defined more than once")]
    DuplicateLoop(String),

    #[error("loop '{loop_name}' syncs to unknown loop '{target}'")]
    UnknownSyncTarget { loop_name: String, target: String },

    #[error("loop '{0}' syncs to itself")]
    SelfSync(String),

    #[error("sync cycle: {}", .0.join(" -> "))]
    SyncCycle(Vec<String>),

    #[error("loop '{loop_name}' step {step}: malformed duration {value}")]
    MalformedDuration {
        loop_name: String,
        step: usize,
        value: f64,
    },

    #[error("loop '{loop_name}' step {step}: chord has no notes")]
    EmptyChord { loop_name: String, step: usize },

    #[error("loop '{0}' never advances the clock")]
    ZeroLengthLoop(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ScoreIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ScoreIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid score ({} problem(s))", self.0.len())?;
        for issue in &self.0 {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("MIDI output unavailable: {0}")]
    Midi(#[source] crate::host::HostError),

    #[error("failed to watch score file: {0}")]
    Watch(#[from] notify::Error),
}
