use std::time::Duration;

use crate::error::ScoreIssue;

/// Tempo shared by every loop of a score. Immutable once built; each player
/// gets its own copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    bpm: f64,
}

impl Clock {
    pub fn new(bpm: f64) -> Result<Self, ScoreIssue> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Self { bpm })
        } else {
            Err(ScoreIssue::InvalidTempo(bpm))
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Negative and NaN spans are zero; spans too long for a `Duration`
    /// saturate.
    pub fn beats_to_duration(&self, beats: f64) -> Duration {
        Duration::try_from_secs_f64((beats * self.seconds_per_beat()).max(0.0))
            .unwrap_or(Duration::MAX)
    }

    pub fn duration_to_beats(&self, duration: Duration) -> f64 {
        duration.as_secs_f64() / self.seconds_per_beat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_tempo() {
        assert!(Clock::new(0.0).is_err());
        assert!(Clock::new(-120.0).is_err());
        assert!(Clock::new(f64::NAN).is_err());
        assert!(Clock::new(f64::INFINITY).is_err());
    }

    #[test]
    fn conversions_at_120_bpm() {
        let clock = Clock::new(120.0).unwrap();
        assert_eq!(clock.seconds_per_beat(), 0.5);
        assert_eq!(clock.beats_to_duration(4.0), Duration::from_secs(2));
        assert_eq!(clock.duration_to_beats(Duration::from_millis(250)), 0.5);
    }

    #[test]
    fn out_of_range_spans_saturate() {
        let clock = Clock::new(120.0).unwrap();
        assert_eq!(clock.beats_to_duration(1e20), Duration::MAX);
        assert_eq!(clock.beats_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(clock.beats_to_duration(-4.0), Duration::ZERO);
        assert_eq!(clock.beats_to_duration(f64::NAN), Duration::ZERO);
    }
}
