use serde::{Deserialize, Serialize};

pub const DEFAULT_AMP: f64 = 1.0;
pub const DEFAULT_RELEASE: f64 = 1.0;
pub const DEFAULT_RATE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteParams {
    /// Beats
    pub release: Option<f64>,
    /// 0.0 -> 1.0 is unity, louder above
    pub amp: Option<f64>,
}

impl NoteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(mut self, beats: f64) -> Self {
        self.release = Some(beats);
        self
    }

    pub fn amp(mut self, amp: f64) -> Self {
        self.amp = Some(amp);
        self
    }

    pub fn release_or_default(&self) -> f64 {
        self.release.unwrap_or(DEFAULT_RELEASE)
    }

    pub fn amp_or_default(&self) -> f64 {
        self.amp.unwrap_or(DEFAULT_AMP)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleParams {
    /// Playback speed, negative plays backwards
    pub rate: Option<f64>,
    pub amp: Option<f64>,
}

impl SampleParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn amp(mut self, amp: f64) -> Self {
        self.amp = Some(amp);
        self
    }

    pub fn rate_or_default(&self) -> f64 {
        self.rate.unwrap_or(DEFAULT_RATE)
    }

    pub fn amp_or_default(&self) -> f64 {
        self.amp.unwrap_or(DEFAULT_AMP)
    }
}
